mod binance;
mod bybit;
mod coingecko;
mod transport;

pub use binance::BinanceAdapter;
pub use bybit::BybitAdapter;
pub use coingecko::CoinGeckoAdapter;
