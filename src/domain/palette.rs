// Chart color palette and per-site color assignment
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

pub const DEFAULT_PALETTE: [&str; 5] = ["#8884d8", "#82ca9d", "#ffc658", "#ff7300", "#0088fe"];

/// How sites are mapped onto palette colors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorStrategy {
    /// Color derived from the site id, independent of response ordering
    #[default]
    StableHash,
    /// Next palette color for each newly seen active site, in arrival order
    FirstSeen,
    /// Hash slot remembered per site for the life of the process; a new site
    /// whose slot is taken moves to the next free one until the palette runs out
    Registry,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    colors: Vec<String>,
}

impl Palette {
    /// Returns `None` for an empty color list
    pub fn new(colors: Vec<String>) -> Option<Self> {
        if colors.is_empty() {
            None
        } else {
            Some(Self { colors })
        }
    }

    /// Color at `index`, wrapping around the palette
    pub fn cycle(&self, index: usize) -> &str {
        &self.colors[index % self.colors.len()]
    }

    fn hash_slot(&self, site_id: &str) -> usize {
        (fnv1a(site_id.as_bytes()) % self.colors.len() as u64) as usize
    }

    pub fn for_site(&self, site_id: &str) -> &str {
        self.cycle(self.hash_slot(site_id))
    }

    /// Colors for `site_ids`, given in first-seen order
    pub fn assign<'a, I>(
        &self,
        strategy: ColorStrategy,
        registry: &ColorRegistry,
        site_ids: I,
    ) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        match strategy {
            ColorStrategy::StableHash => site_ids
                .into_iter()
                .map(|id| self.for_site(id).to_string())
                .collect(),
            ColorStrategy::FirstSeen => site_ids
                .into_iter()
                .enumerate()
                .map(|(index, _)| self.cycle(index).to_string())
                .collect(),
            ColorStrategy::Registry => registry.assign(self, site_ids),
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            colors: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Palette slots handed out to sites so far
#[derive(Debug, Default)]
pub struct ColorRegistry {
    slots: Mutex<HashMap<String, usize>>,
}

impl ColorRegistry {
    pub fn assign<'a, I>(&self, palette: &Palette, site_ids: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let site_ids: Vec<&str> = site_ids.into_iter().collect();
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);

        // Sites new to the registry claim slots in id order, not arrival order
        let mut fresh: Vec<&str> = site_ids
            .iter()
            .copied()
            .filter(|id| !slots.contains_key(*id))
            .collect();
        fresh.sort_unstable();
        fresh.dedup();

        for id in fresh {
            let taken: HashSet<usize> = slots.values().copied().collect();
            let home = palette.hash_slot(id);
            let len = palette.colors.len();
            let slot = (0..len)
                .map(|offset| (home + offset) % len)
                .find(|slot| !taken.contains(slot))
                .unwrap_or(home);
            slots.insert(id.to_string(), slot);
        }

        site_ids
            .iter()
            .map(|id| {
                let slot = slots
                    .get(*id)
                    .copied()
                    .unwrap_or_else(|| palette.hash_slot(id));
                palette.cycle(slot).to_string()
            })
            .collect()
    }
}

// FNV-1a, 64 bit. Fixed constants keep colors identical across builds and restarts.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    bytes.iter().fold(OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(PRIME)
    })
}
