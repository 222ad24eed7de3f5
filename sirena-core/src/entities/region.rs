//! Administrative regions and their alert state.

use compact_str::CompactString;
use serde::Serialize;
use time::OffsetDateTime;

pub type RegionId = u32;

/// Regions known to the alert source, in the order they are matched.
const KNOWN_REGIONS: [(RegionId, &str, &str); 25] = [
    (1, "Вінницька область", "Vinnytsia oblast"),
    (2, "Волинська область", "Volyn oblast"),
    (3, "Дніпропетровська область", "Dnipropetrovsk oblast"),
    (4, "Донецька область", "Donetsk oblast"),
    (5, "Житомирська область", "Zhytomyr oblast"),
    (6, "Закарпатська область", "Zakarpattia oblast"),
    (7, "Запорізька область", "Zaporizhzhia oblast"),
    (8, "Івано-Франківська область", "Ivano-Frankivsk oblast"),
    (9, "Київська область", "Kyiv oblast"),
    (10, "Кіровоградська область", "Kirovohrad oblast"),
    (11, "Луганська область", "Luhansk oblast"),
    (12, "Львівська область", "Lviv oblast"),
    (13, "Миколаївська область", "Mykolaiv oblast"),
    (14, "Одеська область", "Odesa oblast"),
    (15, "Полтавська область", "Poltava oblast"),
    (16, "Рівненська область", "Rivne oblast"),
    (17, "Сумська область", "Sumy oblast"),
    (18, "Тернопільська область", "Ternopil oblast"),
    (19, "Харківська область", "Kharkiv oblast"),
    (20, "Херсонська область", "Kherson oblast"),
    (21, "Хмельницька область", "Khmelnytskyi oblast"),
    (22, "Черкаська область", "Cherkasy oblast"),
    (23, "Чернівецька область", "Chernivtsi oblast"),
    (24, "Чернігівська область", "Chernihiv oblast"),
    (25, "м. Київ", "Kyiv"),
];

/// Alert state of one region.
///
/// Owned by the alert monitor; other components only ever see clones
/// carried in event payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Region {
    pub id: RegionId,
    /// Name as it appears in alert-source posts.
    pub local_name: CompactString,
    pub display_name: CompactString,
    pub alert_active: bool,
    /// Timestamp of the post that caused the last transition.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_changed: Option<OffsetDateTime>,
}

impl Region {
    pub fn new(
        id: RegionId,
        local_name: impl Into<CompactString>,
        display_name: impl Into<CompactString>,
    ) -> Self {
        Self {
            id,
            local_name: local_name.into(),
            display_name: display_name.into(),
            alert_active: false,
            last_changed: None,
        }
    }
}

/// The set of known regions, one instance per id.
#[derive(Debug, Clone)]
pub struct RegionTable {
    regions: Vec<Region>,
}

impl RegionTable {
    /// All oblasts of Ukraine plus the capital, none alerted.
    pub fn ukraine() -> Self {
        Self {
            regions: KNOWN_REGIONS
                .iter()
                .map(|(id, local, display)| Region::new(*id, *local, *display))
                .collect(),
        }
    }

    pub fn get(&self, id: RegionId) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == id)
    }

    pub fn contains(&self, id: RegionId) -> bool {
        self.get(id).is_some()
    }

    /// The first region, in table order, whose local name occurs in `text`.
    ///
    /// A post naming several regions only affects the first one.
    pub fn first_match_mut(&mut self, text: &str) -> Option<&mut Region> {
        self.regions
            .iter_mut()
            .find(|r| text.contains(r.local_name.as_str()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }
}
