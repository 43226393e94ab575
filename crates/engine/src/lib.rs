pub mod announcer;
pub mod correlator;
pub mod ledger;
pub mod messenger;
pub mod orchestrator;
pub mod reactions;
pub mod release;
pub mod retry;
