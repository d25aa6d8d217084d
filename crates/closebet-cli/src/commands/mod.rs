pub mod backtest;
pub mod live;
pub mod optimize;
pub mod report;
