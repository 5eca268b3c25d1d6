use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use common::Result;
use strategy::SymbolState;

/// Persisted trailing parameters of one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolSnapshot {
    /// Signed position at capture time, used to detect a broker position
    /// that changed side after the save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    pub pendant_coefficient: u32,
    pub extreme_since_entry: f64,
    pub entry_moving_average: f64,
    /// Only honoured when resuming within the same trading day.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_trade_done: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pendant_trade_done: Option<bool>,
}

/// Snapshot file contents, keyed by instrument, serialized in key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(pub BTreeMap<String, SymbolSnapshot>);

impl SymbolSnapshot {
    /// A flat entry never matches an open position; a recorded position
    /// must be on the same side.
    fn matches_holding(&self, position: i64) -> bool {
        self.pendant_coefficient != 0
            && self.position.map_or(true, |p| p.signum() == position.signum())
    }
}

impl Snapshot {
    /// Capture every instrument's parameters and guard flags.
    pub fn capture(states: &HashMap<String, SymbolState>) -> Self {
        Snapshot(
            states
                .iter()
                .map(|(symbol, st)| {
                    (
                        symbol.clone(),
                        SymbolSnapshot {
                            position: Some(st.position),
                            pendant_coefficient: st.pendant_coefficient,
                            extreme_since_entry: st.extreme_since_entry,
                            entry_moving_average: st.entry_moving_average,
                            day_trade_done: Some(st.day_trade_done),
                            pendant_trade_done: Some(st.pendant_trade_done),
                        },
                    )
                })
                .collect(),
        )
    }

    /// Merge into freshly seeded states. Instruments absent from `states`
    /// are ignored. Trailing parameters are only restored onto open
    /// positions, and only when the saved entry describes a holding on the
    /// same side; otherwise the broker-seeded values are kept.
    /// Returns the number of instruments that received any field.
    pub fn apply(&self, states: &mut HashMap<String, SymbolState>, resume_intraday: bool) -> usize {
        let mut restored = 0;
        for (symbol, snap) in &self.0 {
            let Some(st) = states.get_mut(symbol) else {
                debug!(symbol = %symbol, "Snapshot entry for inactive instrument ignored");
                continue;
            };
            let mut applied = false;
            if !st.is_flat() {
                if snap.matches_holding(st.position) {
                    st.pendant_coefficient = snap.pendant_coefficient;
                    st.extreme_since_entry = snap.extreme_since_entry;
                    st.entry_moving_average = snap.entry_moving_average;
                    applied = true;
                } else {
                    warn!(
                        symbol = %symbol,
                        position = st.position,
                        saved_position = ?snap.position,
                        saved_coef = snap.pendant_coefficient,
                        "Snapshot does not match broker position, keeping seeded trailing state"
                    );
                }
            }
            if resume_intraday {
                st.day_trade_done = snap.day_trade_done.unwrap_or(st.day_trade_done);
                st.pendant_trade_done = snap.pendant_trade_done.unwrap_or(st.pendant_trade_done);
                applied |= snap.day_trade_done.is_some() || snap.pendant_trade_done.is_some();
            }
            if applied {
                restored += 1;
            }
        }
        restored
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// JSON snapshot file. Saves go through a sibling temp file and a rename so
/// a crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when no snapshot exists yet.
    pub fn load(&self) -> Result<Option<Snapshot>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (SnapshotStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!("donma_snapshot_{}", uuid::Uuid::new_v4()));
        (SnapshotStore::new(dir.join("state.json")), dir)
    }

    fn held(position: i64) -> SymbolState {
        SymbolState {
            position,
            entry_reference_price: 100.0,
            entry_moving_average: 97.25,
            extreme_since_entry: 112.5,
            pendant_coefficient: 3,
            day_trade_done: true,
            pendant_trade_done: true,
            daily_updated_since_start: true,
        }
    }

    #[test]
    fn missing_file_is_not_found() {
        let (store, _dir) = temp_store();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn roundtrip_preserves_trailing_parameters() {
        let (store, dir) = temp_store();
        let mut states = HashMap::new();
        states.insert("SHFE.rb2010".to_string(), held(7));

        store.save(&Snapshot::capture(&states)).unwrap();
        let loaded = store.load().unwrap().unwrap();

        let mut fresh = HashMap::new();
        fresh.insert("SHFE.rb2010".to_string(), SymbolState::seeded(7, 100.0));
        assert_eq!(loaded.apply(&mut fresh, false), 1);

        let st = &fresh["SHFE.rb2010"];
        assert_eq!(st.pendant_coefficient, 3);
        assert_eq!(st.extreme_since_entry, 112.5);
        assert_eq!(st.entry_moving_average, 97.25);
        // guard flags stay fresh outside intraday resume
        assert!(!st.day_trade_done);
        assert!(!st.pendant_trade_done);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn intraday_resume_restores_guard_flags() {
        let mut states = HashMap::new();
        states.insert("DCE.m2101".to_string(), held(-4));
        let snap = Snapshot::capture(&states);

        let mut fresh = HashMap::new();
        fresh.insert("DCE.m2101".to_string(), SymbolState::seeded(-4, 100.0));
        snap.apply(&mut fresh, true);

        assert!(fresh["DCE.m2101"].day_trade_done);
        assert!(fresh["DCE.m2101"].pendant_trade_done);
    }

    #[test]
    fn flat_instrument_keeps_zeroed_parameters() {
        let mut states = HashMap::new();
        states.insert("CZCE.AP010".to_string(), held(5));
        let snap = Snapshot::capture(&states);

        let mut fresh = HashMap::new();
        fresh.insert("CZCE.AP010".to_string(), SymbolState::default());
        snap.apply(&mut fresh, true);

        let st = &fresh["CZCE.AP010"];
        assert_eq!(st.pendant_coefficient, 0);
        assert_eq!(st.extreme_since_entry, 0.0);
        assert!(st.day_trade_done);
    }

    #[test]
    fn flat_snapshot_keeps_seeded_open_position() {
        let mut states = HashMap::new();
        states.insert("DCE.m2101".to_string(), SymbolState::default());
        let snap = Snapshot::capture(&states);

        let mut fresh = HashMap::new();
        fresh.insert("DCE.m2101".to_string(), SymbolState::seeded(-5, 100.0));
        assert_eq!(snap.apply(&mut fresh, false), 0);

        let st = fresh["DCE.m2101"].clone();
        assert_eq!(st, SymbolState::seeded(-5, 100.0));

        // a profitable short above the tighter average stays open
        let channel = strategy::DailyChannel {
            upper_band: 110.0,
            lower_band: 90.0,
            moving_average: 102.0,
        };
        let engine = strategy::TrailingExitEngine::new(risk::PositionSizer::new(
            risk::SizingConfig::default(),
        ));
        let mut st = st;
        st.on_new_daily_bar();
        let transitions = engine.on_tick(&mut st, &channel, 99.0, 10.0);
        assert!(!transitions
            .iter()
            .any(|t| matches!(t, strategy::Transition::Exited { .. })));
        assert_eq!(st.position, -5);
    }

    #[test]
    fn opposite_side_snapshot_keeps_seeded_values() {
        let mut states = HashMap::new();
        states.insert("SHFE.rb2010".to_string(), held(7));
        let snap = Snapshot::capture(&states);

        let mut fresh = HashMap::new();
        fresh.insert("SHFE.rb2010".to_string(), SymbolState::seeded(-4, 3600.0));
        assert_eq!(snap.apply(&mut fresh, false), 0);

        let st = &fresh["SHFE.rb2010"];
        assert_eq!(st.pendant_coefficient, 1);
        assert_eq!(st.extreme_since_entry, 3600.0);
        assert_eq!(st.entry_moving_average, 3600.0);
    }

    #[test]
    fn flat_instrument_without_intraday_is_not_counted() {
        let mut states = HashMap::new();
        states.insert("CZCE.AP010".to_string(), held(5));
        let snap = Snapshot::capture(&states);

        let mut fresh = HashMap::new();
        fresh.insert("CZCE.AP010".to_string(), SymbolState::default());
        assert_eq!(snap.apply(&mut fresh, false), 0);
        assert_eq!(snap.apply(&mut fresh, true), 1);
    }

    #[test]
    fn unknown_instruments_are_skipped() {
        let mut states = HashMap::new();
        states.insert("OLD.x".to_string(), held(1));
        let snap = Snapshot::capture(&states);

        let mut fresh: HashMap<String, SymbolState> = HashMap::new();
        assert_eq!(snap.apply(&mut fresh, false), 0);
    }

    #[test]
    fn file_without_guard_flags_still_loads() {
        let (store, dir) = temp_store();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            store.path(),
            r#"{"SHFE.rb2010": {"pendant_coefficient": 2, "extreme_since_entry": 3700.0, "entry_moving_average": 3550.0}}"#,
        )
        .unwrap();

        let snap = store.load().unwrap().unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.0["SHFE.rb2010"].day_trade_done, None);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let (store, dir) = temp_store();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(store.path(), "{not json").unwrap();
        assert!(matches!(store.load(), Err(common::Error::Json(_))));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
