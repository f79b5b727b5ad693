pub mod aggregator;
pub mod binance;
pub mod bitfinex;
pub mod rolling_window;
pub mod stream_client;
