//! Small helpers for timing and modem report formatting.

use futures_timer::Delay;
use log::{debug, info};
use std::time::Duration;

use crate::api::models::ModemInfo;
use crate::types::constants::signal_strength;

/// Waits for `duration`; returns immediately for zero.
pub(crate) async fn pause(duration: Duration) {
    if duration.is_zero() {
        return;
    }
    Delay::new(duration).await;
}

/// Converts a raw RSRP index reported by the modem to dBm.
///
/// Returns `None` for the "not known" value (255) or text that does not parse.
pub(crate) fn rsrp_to_dbm(raw: &str) -> Option<i32> {
    let index: i32 = raw.trim().parse().ok()?;
    if !(0..=97).contains(&index) {
        return None;
    }
    Some(index - signal_strength::RSRP_OFFSET_DBM)
}

/// Converts RSRP in dBm to a 4-character bar representation.
pub(crate) fn bars_from_rsrp(dbm: i32) -> &'static str {
    match dbm {
        d if d >= signal_strength::BAR_4_MIN => "▂▄▆█",
        d if d >= signal_strength::BAR_3_MIN => "▂▄▆_",
        d if d >= signal_strength::BAR_2_MIN => "▂▄__",
        _ => "▂___",
    }
}

/// Logs whatever the modem reported. Missing fields are logged at debug level.
pub(crate) fn log_modem_info(info: &ModemInfo) {
    let fields = [
        ("Modem IMEI", &info.imei),
        ("SIM ICCID", &info.iccid),
        ("Network operator", &info.operator),
        ("IP address", &info.ip_address),
    ];
    for (label, value) in fields {
        match value {
            Some(v) => info!("{label}: {v}"),
            None => debug!("{label} not reported by modem"),
        }
    }

    match info.rsrp.as_deref().map(|raw| (raw, rsrp_to_dbm(raw))) {
        Some((_, Some(dbm))) => info!("Signal strength (RSRP): {dbm} dBm {}", bars_from_rsrp(dbm)),
        Some((raw, None)) => info!("Signal strength (RSRP): {raw}"),
        None => debug!("RSRP not reported by modem"),
    }
}
