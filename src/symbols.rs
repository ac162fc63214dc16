//! Static symbol universe (spec §6.1: "a static list `SYMBOLS_TO_TRACK` of
//! ~90 perpetual symbols is baked in at build time").

/// Venue symbols tracked by the ingest shards, the OI-surge scan, and the
/// default subscriber universe. Upper-case, no separators, matching the
/// upstream venue convention (`BTCUSDT`, not `BTC-USDT`).
pub const SYMBOLS_TO_TRACK: &[&str] = &[
    "BTCUSDT", "ETHUSDT", "BNBUSDT", "SOLUSDT", "XRPUSDT", "ADAUSDT", "DOGEUSDT", "AVAXUSDT",
    "DOTUSDT", "MATICUSDT", "LINKUSDT", "LTCUSDT", "TRXUSDT", "ATOMUSDT", "UNIUSDT", "ETCUSDT",
    "XLMUSDT", "NEARUSDT", "APTUSDT", "FILUSDT", "ARBUSDT", "OPUSDT", "INJUSDT", "SUIUSDT",
    "SEIUSDT", "TIAUSDT", "RUNEUSDT", "AAVEUSDT", "MKRUSDT", "SNXUSDT", "CRVUSDT", "COMPUSDT",
    "SANDUSDT", "MANAUSDT", "AXSUSDT", "GALAUSDT", "CHZUSDT", "ENJUSDT", "FLOWUSDT", "THETAUSDT",
    "EOSUSDT", "XTZUSDT", "ALGOUSDT", "ICPUSDT", "VETUSDT", "FTMUSDT", "ONEUSDT", "HBARUSDT",
    "EGLDUSDT", "KAVAUSDT", "ROSEUSDT", "ZILUSDT", "IOTAUSDT", "WAVESUSDT", "DASHUSDT", "ZECUSDT",
    "XMRUSDT", "QTUMUSDT", "OMGUSDT", "BATUSDT", "ZRXUSDT", "KNCUSDT", "RENUSDT", "STORJUSDT",
    "SKLUSDT", "ANKRUSDT", "CTSIUSDT", "OCEANUSDT", "RSRUSDT", "CELRUSDT", "DENTUSDT", "HOTUSDT",
    "WOOUSDT", "GMTUSDT", "APEUSDT", "LDOUSDT", "DYDXUSDT", "GMXUSDT", "IMXUSDT", "MASKUSDT",
    "PEOPLEUSDT", "JASMYUSDT", "CFXUSDT", "RDNTUSDT", "HOOKUSDT", "MAGICUSDT", "SSVUSDT",
    "HIFIUSDT", "BLURUSDT", "PENDLEUSDT", "STXUSDT", "ORDIUSDT", "1000PEPEUSDT", "1000SHIBUSDT",
    "WLDUSDT",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn universe_is_nonempty_and_unique() {
        let mut seen = std::collections::HashSet::new();
        for sym in SYMBOLS_TO_TRACK {
            assert!(seen.insert(*sym), "duplicate symbol {sym}");
            assert_eq!(*sym, sym.to_uppercase());
        }
        assert!(SYMBOLS_TO_TRACK.len() >= 80);
    }
}
