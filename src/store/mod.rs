//! Record store: one simulated context's object space.
//!
//! The recorded baseline is sorted at load time and never changes. SET
//! writes land in an overlay map that shadows it; walks merge both. All
//! varbinds of one request resolve under a single [`ReadView`] or
//! [`WriteView`], so a reader never sees half of a SET.
//!
//! ```
//! use snmp_responder::{LoadMode, Store, Value, oid};
//!
//! let store = Store::load(
//!     "public",
//!     "1.3.6.1.2.1.1.5.0|4|zeus\n1.3.6.1.2.1.1.6.0|4|lab|writecache\n",
//!     LoadMode::Strict,
//! )
//! .unwrap();
//!
//! let next = store.lookup_next(&oid!(1, 3, 6, 1, 2, 1, 1)).unwrap();
//! assert_eq!(next.value, Value::from("zeus"));
//!
//! store.write(&oid!(1, 3, 6, 1, 2, 1, 1, 6, 0), Value::from("rack 4")).unwrap();
//! assert!(store.write(&oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), Value::from("x")).is_err());
//! ```

mod record;

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

pub use record::{Record, VariationSpec};

use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::value::Value;
use crate::variation::Variation;

/// How a load treats unparseable lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Skip bad lines with a warning; later duplicates replace earlier ones.
    #[default]
    Lenient,
    /// Any bad or duplicate line rejects the whole store.
    Strict,
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Lenient => "lenient",
            Self::Strict => "strict",
        })
    }
}

impl std::str::FromStr for LoadMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            _ => Err(format!("unknown load mode '{s}' (expected lenient or strict)")),
        }
    }
}

/// A recorded entry.
#[derive(Debug)]
pub struct Entry {
    pub oid: Oid,
    pub value: Value,
    pub variation: Option<Variation>,
}

impl Entry {
    pub fn new(oid: Oid, value: Value) -> Self {
        Self {
            oid,
            value,
            variation: None,
        }
    }

    pub fn with_variation(mut self, variation: Variation) -> Self {
        self.variation = Some(variation);
        self
    }

    fn from_record(record: Record) -> std::result::Result<Self, String> {
        let variation = record
            .variation
            .as_ref()
            .map(|spec| Variation::from_spec(spec, &record.oid, &record.value))
            .transpose()?;
        Ok(Self {
            oid: record.oid,
            value: record.value,
            variation,
        })
    }

    pub fn to_record(&self) -> Record {
        Record {
            oid: self.oid.clone(),
            value: self.value.clone(),
            variation: self.variation.as_ref().map(Variation::spec),
        }
    }
}

/// One lookup result. `value` is the effective value before any variation
/// runs: the overlay's if it has one, the recorded value otherwise.
#[derive(Debug, Clone)]
pub struct Slot<'s> {
    pub oid: Oid,
    pub value: Value,
    /// The recorded entry, absent for OIDs that only exist in the overlay.
    pub entry: Option<&'s Entry>,
}

/// A loaded context.
pub struct Store {
    name: Box<str>,
    entries: Vec<Entry>,
    overlay: RwLock<BTreeMap<Oid, Value>>,
    loaded_at: Instant,
    skipped: usize,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.name)
            .field("entries", &self.entries.len())
            .field("skipped", &self.skipped)
            .finish()
    }
}

impl Store {
    /// Parse `text` as record lines.
    pub fn load(name: &str, text: &str, mode: LoadMode) -> Result<Self> {
        Self::parse(name, name, text, mode)
    }

    /// Load a `.snmprec` file. The store is named after the file stem.
    pub fn load_file(path: impl AsRef<Path>, mode: LoadMode) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| {
            Error::Io {
                path: path.display().to_string().into(),
                source,
            }
            .boxed()
        })?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::parse(&name, &path.display().to_string(), &text, mode)
    }

    /// Build a store from entries. Later duplicates replace earlier ones.
    pub fn from_entries(name: &str, entries: impl IntoIterator<Item = Entry>) -> Self {
        let map: BTreeMap<Oid, Entry> = entries.into_iter().map(|e| (e.oid.clone(), e)).collect();
        Self::with_entries(name, map.into_values().collect(), 0)
    }

    fn with_entries(name: &str, entries: Vec<Entry>, skipped: usize) -> Self {
        Self {
            name: name.into(),
            entries,
            overlay: RwLock::new(BTreeMap::new()),
            loaded_at: Instant::now(),
            skipped,
        }
    }

    fn parse(name: &str, origin: &str, text: &str, mode: LoadMode) -> Result<Self> {
        let malformed = |line: usize, reason: String| {
            Error::MalformedRecord {
                path: origin.into(),
                line,
                reason: reason.into(),
            }
            .boxed()
        };

        let mut entries: BTreeMap<Oid, Entry> = BTreeMap::new();
        let mut skipped = 0;
        for (index, line) in text.lines().enumerate() {
            let line_no = index + 1;
            let parsed = Record::parse(line).and_then(|r| r.map(Entry::from_record).transpose());
            let entry = match parsed {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(reason) if mode == LoadMode::Strict => return Err(malformed(line_no, reason)),
                Err(reason) => {
                    tracing::warn!(target: "snmp_responder::store", { snmp.store = %origin, line = line_no, %reason }, "skipping malformed record");
                    skipped += 1;
                    continue;
                }
            };
            if entries.contains_key(&entry.oid) {
                if mode == LoadMode::Strict {
                    return Err(malformed(line_no, format!("duplicate OID {}", entry.oid)));
                }
                tracing::warn!(target: "snmp_responder::store", { snmp.store = %origin, line = line_no, snmp.oid = %entry.oid }, "duplicate OID replaces earlier record");
            }
            entries.insert(entry.oid.clone(), entry);
        }

        let store = Self::with_entries(name, entries.into_values().collect(), skipped);
        tracing::debug!(target: "snmp_responder::store", { snmp.store = %origin, entries = store.entries.len(), skipped }, "store loaded");
        Ok(store)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Recorded entries in OID order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lines skipped by a lenient load.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn loaded_at(&self) -> Instant {
        self.loaded_at
    }

    /// Number of OIDs currently shadowed or added by writes.
    pub fn overlay_len(&self) -> usize {
        self.read().overlay.len()
    }

    pub fn read(&self) -> ReadView<'_> {
        ReadView {
            entries: &self.entries,
            overlay: self.overlay.read().unwrap_or_else(PoisonError::into_inner),
        }
    }

    pub fn write_guard(&self) -> WriteView<'_> {
        WriteView {
            entries: &self.entries,
            overlay: self.overlay.write().unwrap_or_else(PoisonError::into_inner),
        }
    }

    pub fn lookup_exact(&self, oid: &Oid) -> Option<Slot<'_>> {
        self.read().lookup_exact(oid)
    }

    pub fn lookup_next(&self, oid: &Oid) -> Option<Slot<'_>> {
        self.read().lookup_next(oid)
    }

    pub fn lookup_range(&self, start: &Oid, count: usize) -> Vec<Slot<'_>> {
        self.read().lookup_range(start, count)
    }

    pub fn write(&self, oid: &Oid, value: Value) -> Result<()> {
        self.write_guard().write(oid, value)
    }

    /// Drop every overlay write. Values held by `persist` entries stay.
    pub fn delete_overlay(&self) {
        let mut overlay = self.overlay.write().unwrap_or_else(PoisonError::into_inner);
        let dropped = overlay.len();
        overlay.clear();
        tracing::debug!(target: "snmp_responder::store", { snmp.store = %self.name, dropped }, "overlay cleared");
    }

    /// Render the recorded baseline back into record lines.
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for entry in &self.entries {
            text.push_str(&entry.to_record().to_line());
            text.push('\n');
        }
        text
    }
}

/// Lookup over the baseline plus one borrowed overlay.
struct Merged<'s, 'g> {
    entries: &'s [Entry],
    overlay: &'g BTreeMap<Oid, Value>,
}

impl<'s> Merged<'s, '_> {
    fn entry(&self, oid: &Oid) -> Option<&'s Entry> {
        self.entries
            .binary_search_by(|e| e.oid.cmp(oid))
            .ok()
            .map(|i| &self.entries[i])
    }

    fn lookup_exact(&self, oid: &Oid) -> Option<Slot<'s>> {
        let entry = self.entry(oid);
        let value = self.overlay.get(oid).or(entry.map(|e| &e.value))?;
        Some(Slot {
            oid: oid.clone(),
            value: value.clone(),
            entry,
        })
    }

    fn lookup_next(&self, oid: &Oid) -> Option<Slot<'s>> {
        let start = self.entries.partition_point(|e| e.oid <= *oid);
        let recorded = self.entries[start..].iter().find(|e| !e.value.is_exception());
        let written = self
            .overlay
            .range::<Oid, _>((Bound::Excluded(oid), Bound::Unbounded))
            .next();

        match (recorded, written) {
            (Some(entry), Some((key, value))) if *key == entry.oid => Some(Slot {
                oid: key.clone(),
                value: value.clone(),
                entry: Some(entry),
            }),
            (Some(entry), Some((key, _))) if entry.oid < *key => Some(Slot {
                oid: entry.oid.clone(),
                value: entry.value.clone(),
                entry: Some(entry),
            }),
            (_, Some((key, value))) => Some(Slot {
                oid: key.clone(),
                value: value.clone(),
                entry: self.entry(key),
            }),
            (Some(entry), None) => Some(Slot {
                oid: entry.oid.clone(),
                value: entry.value.clone(),
                entry: Some(entry),
            }),
            (None, None) => None,
        }
    }

    fn lookup_range(&self, start: &Oid, count: usize) -> Vec<Slot<'s>> {
        let mut slots = Vec::with_capacity(count.min(64));
        let mut cursor = start.clone();
        while slots.len() < count {
            let Some(slot) = self.lookup_next(&cursor) else {
                break;
            };
            cursor = slot.oid.clone();
            slots.push(slot);
        }
        slots
    }

    fn has_children(&self, prefix: &Oid) -> bool {
        let start = self.entries.partition_point(|e| e.oid < *prefix);
        let recorded = self
            .entries
            .get(start)
            .is_some_and(|e| e.oid.starts_with(prefix));
        recorded
            || self
                .overlay
                .range::<Oid, _>(prefix..)
                .next()
                .is_some_and(|(key, _)| key.starts_with(prefix))
    }

    fn check_write(&self, oid: &Oid, value: &Value) -> Result<()> {
        let wrong_type = || Error::WrongType { oid: oid.clone() }.boxed();
        if value.is_exception() || matches!(value, Value::Unknown { .. }) {
            return Err(wrong_type());
        }
        match self.entry(oid) {
            Some(entry) => match &entry.variation {
                Some(variation) if variation.is_writable() => {
                    if entry.value.same_kind(value) {
                        Ok(())
                    } else {
                        Err(wrong_type())
                    }
                }
                _ => Err(Error::NotWritable { oid: oid.clone() }.boxed()),
            },
            None => match self.overlay.get(oid) {
                Some(current) if !current.same_kind(value) => Err(wrong_type()),
                _ => Ok(()),
            },
        }
    }
}

/// Shared view; many readers at once.
pub struct ReadView<'s> {
    entries: &'s [Entry],
    overlay: RwLockReadGuard<'s, BTreeMap<Oid, Value>>,
}

impl<'s> ReadView<'s> {
    fn merged(&self) -> Merged<'s, '_> {
        Merged {
            entries: self.entries,
            overlay: &self.overlay,
        }
    }

    /// `None` when neither the baseline nor the overlay holds `oid`.
    pub fn lookup_exact(&self, oid: &Oid) -> Option<Slot<'s>> {
        self.merged().lookup_exact(oid)
    }

    /// Smallest OID strictly after `oid`; `None` at the end of the view.
    /// Recorded exception markers are not walkable.
    pub fn lookup_next(&self, oid: &Oid) -> Option<Slot<'s>> {
        self.merged().lookup_next(oid)
    }

    pub fn lookup_range(&self, start: &Oid, count: usize) -> Vec<Slot<'s>> {
        self.merged().lookup_range(start, count)
    }

    /// True when anything at or below `prefix` is recorded or written.
    pub fn has_children(&self, prefix: &Oid) -> bool {
        self.merged().has_children(prefix)
    }
}

/// Exclusive view for SET: validate every varbind, then apply them all.
pub struct WriteView<'s> {
    entries: &'s [Entry],
    overlay: RwLockWriteGuard<'s, BTreeMap<Oid, Value>>,
}

impl<'s> WriteView<'s> {
    fn merged(&self) -> Merged<'s, '_> {
        Merged {
            entries: self.entries,
            overlay: &self.overlay,
        }
    }

    pub fn lookup_exact(&self, oid: &Oid) -> Option<Slot<'s>> {
        self.merged().lookup_exact(oid)
    }

    pub fn lookup_next(&self, oid: &Oid) -> Option<Slot<'s>> {
        self.merged().lookup_next(oid)
    }

    pub fn lookup_range(&self, start: &Oid, count: usize) -> Vec<Slot<'s>> {
        self.merged().lookup_range(start, count)
    }

    pub fn has_children(&self, prefix: &Oid) -> bool {
        self.merged().has_children(prefix)
    }

    /// Validate a write without applying it.
    ///
    /// Recorded entries accept writes only through a writable variation and
    /// only of the recorded kind. OIDs outside the baseline are free-form,
    /// except that an overlay value keeps its kind.
    pub fn check(&self, oid: &Oid, value: &Value) -> Result<()> {
        self.merged().check_write(oid, value)
    }

    /// Apply a write that [`check`](Self::check) accepted.
    pub fn apply(&mut self, oid: &Oid, value: Value) {
        let absorbed = self
            .merged()
            .entry(oid)
            .and_then(|e| e.variation.as_ref())
            .is_some_and(|v| v.absorb_write(&value));
        if !absorbed {
            self.overlay.insert(oid.clone(), value);
        }
    }

    pub fn write(&mut self, oid: &Oid, value: Value) -> Result<()> {
        self.check(oid, &value)?;
        self.apply(oid, value);
        Ok(())
    }
}
