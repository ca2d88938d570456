// src/bpm.rs
use serde::{Deserialize, Serialize};

// BPM 名称表：按 cell 分组的 (名称, id)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bpm {
    pub name: String,
    pub id: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BpmGroup {
    pub name: String,
    pub bpms: Vec<Bpm>,
}

impl BpmGroup {
    fn new(name: String, bpms: Vec<Bpm>) -> Self {
        Self { name, bpms }
    }
}

// 选择哪一个加速器的 BPM 表
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default, Deserialize, Serialize)]
pub enum BpmList {
    #[default]
    Storage,
    Booster,
}

impl BpmList {
    pub fn groups(self) -> Vec<BpmGroup> {
        match self {
            BpmList::Storage => storage_bpms(),
            BpmList::Booster => booster_bpms(),
        }
    }

    pub fn name_of(self, id: usize) -> Option<String> {
        self.groups()
            .into_iter()
            .flat_map(|group| group.bpms)
            .find(|bpm| bpm.id == id)
            .map(|bpm| bpm.name)
    }

    /// Status text for a channel, with the BPM name when the id is known.
    pub fn label(self, id: usize) -> String {
        match self.name_of(id) {
            Some(name) => format!("BPM: {name} (id {id})"),
            None => format!("BPM id {id}"),
        }
    }
}

/// Storage ring: seven BPMs in each of 24 cells, numbered from 1, plus the
/// extra BPMs in cells 13 and 21.
pub fn storage_bpms() -> Vec<BpmGroup> {
    let mut groups = vec![BpmGroup::new("Other".to_owned(), Vec::new())];
    for cell in 1..=24 {
        let bpms = (1..=7)
            .map(|n| Bpm {
                name: format!("SR{cell:02}C-DI-EBPM-{n:02}"),
                id: 7 * (cell - 1) + n,
            })
            .collect();
        groups.push(BpmGroup::new(format!("Cell {cell}"), bpms));
    }
    groups[21].bpms.push(Bpm {
        name: "SR21C-DI-EBPM-08".to_owned(),
        id: 169,
    });
    groups[13].bpms.extend((1..=2).map(|n| Bpm {
        name: format!("SR13S-DI-EBPM-{n:02}"),
        id: 169 + n,
    }));
    groups
}

/// Booster: 22 BPMs spread over four cells.
pub fn booster_bpms() -> Vec<BpmGroup> {
    let bpms = (0..22)
        .map(|n| Bpm {
            name: format!("BR{:02}C-DI-EBPM-{:02}", ((2 * n + 6) / 11) % 4 + 1, n + 1),
            id: n + 1,
        })
        .collect();
    vec![
        BpmGroup::new("Other".to_owned(), Vec::new()),
        BpmGroup::new("Booster".to_owned(), bpms),
    ]
}
