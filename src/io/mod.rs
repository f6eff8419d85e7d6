/// CSV export of the history log.
pub mod export;
