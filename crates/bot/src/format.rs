//! Message formatting for the announcement channel.
//!
//! Announcements use Telegram HTML (`<b>`, `<i>`, `<a href>`), so everything
//! user- or source-supplied is escaped first. Command replies are plain text.

use marquee_common::types::{LedgerCounts, MediaItem, MediaKind, NotificationRecord};

/// Telegram `sendMessage` text limit (UTF-8 characters).
const MESSAGE_LIMIT: usize = 4096;

/// Synopses longer than this get cut; the full text is one click away anyway.
const SYNOPSIS_LIMIT: usize = 400;

/// Build the HTML announcement for a newly released item.
pub fn announcement(item: &MediaItem, request_emoji: &str) -> String {
    let title = escape(&item.title);
    let url = escape(&item.url);

    let mut lines = Vec::new();
    match item.kind {
        MediaKind::Movie => {
            lines.push(format!(
                "\u{1f3ac} New movie: <b><a href=\"{url}\">{title}</a></b>"
            ));
        }
        MediaKind::Series => {
            lines.push(format!(
                "\u{1f4fa} New episodes: <b><a href=\"{url}\">{title}</a></b>"
            ));
            if let Some(season) = item.season_count {
                lines.push(format!("Season {season}"));
            }
        }
    }

    if !item.release_text.is_empty() {
        lines.push(escape(&item.release_text));
    }
    if let Some(score) = item.score {
        lines.push(format!("\u{2b50} {score:.1}"));
    }
    if let Some(synopsis) = item.synopsis.as_deref() {
        lines.push(format!("<i>{}</i>", escape(&truncate(synopsis, SYNOPSIS_LIMIT))));
    }

    lines.push(String::new());
    lines.push(format!(
        "React with {request_emoji} to request this title."
    ));

    truncate_message(&lines.join("\n"))
}

/// Plain-text reply for the `/stats` command.
pub fn stats_reply(counts: &LedgerCounts) -> String {
    format!(
        "Announced so far: {} total ({} movies, {} series).",
        counts.total, counts.movies, counts.series
    )
}

/// Plain-text reply for the `/recent` command, most recent first.
pub fn recent_reply(records: &[NotificationRecord]) -> String {
    if records.is_empty() {
        return "Nothing announced yet.".to_string();
    }

    let mut lines = vec!["Recent announcements:".to_string()];
    for record in records {
        let season = record
            .season
            .map(|s| format!(" (season {s})"))
            .unwrap_or_default();
        lines.push(format!(
            "- {}{}, {}",
            record.title,
            season,
            record.notified_at.format("%Y-%m-%d")
        ));
    }
    lines.join("\n")
}

/// Escape text for embedding in Telegram HTML.
fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Cut `text` to at most `limit` characters, appending an ellipsis if cut.
fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let cut: String = text.chars().take(limit).collect();
    format!("{}\u{2026}", cut.trim_end())
}

/// Truncate a message to fit within the Telegram character limit.
pub fn truncate_message(text: &str) -> String {
    if text.chars().count() <= MESSAGE_LIMIT {
        return text.to_string();
    }
    let suffix = "\n\n[truncated]";
    let budget = MESSAGE_LIMIT - suffix.len();
    let cut: String = text.chars().take(budget).collect();
    format!("{cut}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_item(kind: MediaKind) -> MediaItem {
        MediaItem::new(
            "https://source.example/title/late-shift",
            "Late Shift",
            kind,
            "Latest Episode: August 20, 2026",
        )
    }

    #[test]
    fn test_movie_announcement_links_title() {
        let item = make_item(MediaKind::Movie);
        let text = announcement(&item, "\u{2764}");
        assert!(text.starts_with("\u{1f3ac} New movie:"));
        assert!(text.contains("<a href=\"https://source.example/title/late-shift\">Late Shift</a>"));
        assert!(text.ends_with("React with \u{2764} to request this title."));
    }

    #[test]
    fn test_series_announcement_names_the_season() {
        let mut item = make_item(MediaKind::Series);
        item.season_count = Some(3);
        item.score = Some(8.25);
        let text = announcement(&item, "\u{2764}");
        assert!(text.starts_with("\u{1f4fa} New episodes:"));
        assert!(text.contains("Season 3"));
        assert!(text.contains("\u{2b50} 8.2"));
    }

    #[test]
    fn test_announcement_escapes_html_in_title_and_synopsis() {
        let mut item = make_item(MediaKind::Movie);
        item.title = "Fast & <Furious>".to_string();
        item.synopsis = Some("A \"quiet\" heist".to_string());
        let text = announcement(&item, "\u{2764}");
        assert!(text.contains("Fast &amp; &lt;Furious&gt;"));
        assert!(text.contains("<i>A &quot;quiet&quot; heist</i>"));
    }

    #[test]
    fn test_long_synopsis_is_cut_with_ellipsis() {
        let mut item = make_item(MediaKind::Movie);
        item.synopsis = Some("x".repeat(1000));
        let text = announcement(&item, "\u{2764}");
        assert!(text.contains("\u{2026}"));
        assert!(!text.contains(&"x".repeat(500)));
    }

    #[test]
    fn test_truncate_message_respects_limit() {
        let long = "a".repeat(5000);
        let cut = truncate_message(&long);
        assert!(cut.chars().count() <= MESSAGE_LIMIT);
        assert!(cut.ends_with("[truncated]"));

        assert_eq!(truncate_message("hello"), "hello");
    }

    #[test]
    fn test_stats_reply_wording() {
        let counts = LedgerCounts {
            total: 12,
            movies: 7,
            series: 5,
        };
        assert_eq!(
            stats_reply(&counts),
            "Announced so far: 12 total (7 movies, 5 series)."
        );
    }

    #[test]
    fn test_recent_reply_lists_titles_with_seasons() {
        let record = NotificationRecord {
            id: "a2b9".to_string(),
            item_url: "https://source.example/title/late-shift".to_string(),
            title: "Late Shift".to_string(),
            kind: MediaKind::Series,
            season: Some(2),
            message_id: Some(41),
            notified_at: Utc::now(),
        };
        let text = recent_reply(&[record]);
        assert!(text.starts_with("Recent announcements:"));
        assert!(text.contains("- Late Shift (season 2), "));

        assert_eq!(recent_reply(&[]), "Nothing announced yet.");
    }
}
