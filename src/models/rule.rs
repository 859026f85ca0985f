//! Rule entity model
//!
//! A rule watches one measured quantity (`resource`) at one monitored entity
//! (`position`) and fires when the latest data satisfies `operator value`.

use std::fmt;

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "rules")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Owning user, immutable after creation
    pub user_id: i32,

    /// Optional display name used in issue titles
    pub name: Option<String>,

    pub position: RulePosition,

    pub resource: RuleResource,

    pub operator: RuleOperator,

    /// Threshold compared against the resolved measurement
    pub value: f64,

    pub is_enable: bool,

    /// Unix timestamp of the source record that last produced an issue
    pub last_triggered_by: Option<i64>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Name shown to users: the display name, or the numeric id when unnamed.
    pub fn display_name(&self) -> String {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.id.to_string(),
        }
    }
}

/// Category a position belongs to; decides which report collection backs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Reservoir,
    Electricity,
    Earthquake,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Domain::Reservoir => "reservoir",
            Domain::Electricity => "electricity",
            Domain::Earthquake => "earthquake",
        };
        f.write_str(label)
    }
}

/// Power grid sub-region keyed by the columns of a grid report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GridRegion {
    East,
    South,
    Central,
    North,
}

impl GridRegion {
    pub const ALL: [GridRegion; 4] = [
        GridRegion::East,
        GridRegion::South,
        GridRegion::Central,
        GridRegion::North,
    ];

    pub fn key(self) -> &'static str {
        match self {
            GridRegion::East => "east",
            GridRegion::South => "south",
            GridRegion::Central => "central",
            GridRegion::North => "north",
        }
    }
}

/// Monitored entity a rule is attached to
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RulePosition {
    #[sea_orm(string_value = "SHIMEN_RESERVOIR")]
    ShimenReservoir,
    #[sea_orm(string_value = "FEITSUI_RESERVOIR")]
    FeitsuiReservoir,
    #[sea_orm(string_value = "SECOND_BAOSHAN_RESERVOIR")]
    SecondBaoshanReservoir,
    #[sea_orm(string_value = "YONGHESHAN_RESERVOIR")]
    YongheshanReservoir,
    #[sea_orm(string_value = "MINGDE_RESERVOIR")]
    MingdeReservoir,
    #[sea_orm(string_value = "LIYUTAN_RESERVOIR")]
    LiyutanReservoir,
    #[sea_orm(string_value = "DEJI_RESERVOIR")]
    DejiReservoir,
    #[sea_orm(string_value = "SHIGANG_DAM")]
    ShigangDam,
    #[sea_orm(string_value = "WUSHE_RESERVOIR")]
    WusheReservoir,
    #[sea_orm(string_value = "SUN_MOON_LAKE_RESERVOIR")]
    SunMoonLakeReservoir,
    #[sea_orm(string_value = "JIJI_WEIR")]
    JijiWeir,
    #[sea_orm(string_value = "HUSHAN_RESERVOIR")]
    HushanReservoir,
    #[sea_orm(string_value = "RENYITAN_RESERVOIR")]
    RenyitanReservoir,
    #[sea_orm(string_value = "BAIHE_RESERVOIR")]
    BaiheReservoir,
    #[sea_orm(string_value = "WUSHANTOU_RESERVOIR")]
    WushantouReservoir,
    #[sea_orm(string_value = "ZENGWEN_RESERVOIR")]
    ZengwenReservoir,
    #[sea_orm(string_value = "NANHUA_RESERVOIR")]
    NanhuaReservoir,
    #[sea_orm(string_value = "AGONGDIAN_RESERVOIR")]
    AgongdianReservoir,
    #[sea_orm(string_value = "GAOPING_RIVER_WEIR")]
    GaopingRiverWeir,
    #[sea_orm(string_value = "MUDAN_RESERVOIR")]
    MudanReservoir,
    #[sea_orm(string_value = "EAST_ELECTRICITY")]
    EastElectricity,
    #[sea_orm(string_value = "SOUTH_ELECTRICITY")]
    SouthElectricity,
    #[sea_orm(string_value = "CENTRAL_ELECTRICITY")]
    CentralElectricity,
    #[sea_orm(string_value = "NORTH_ELECTRICITY")]
    NorthElectricity,
    #[sea_orm(string_value = "HSINCHU_EARTHQUAKE")]
    HsinchuEarthquake,
    #[sea_orm(string_value = "TAICHUNG_EARTHQUAKE")]
    TaichungEarthquake,
    #[sea_orm(string_value = "TAINAN_EARTHQUAKE")]
    TainanEarthquake,
}

impl RulePosition {
    pub fn domain(self) -> Domain {
        use RulePosition::*;
        match self {
            ShimenReservoir | FeitsuiReservoir | SecondBaoshanReservoir | YongheshanReservoir
            | MingdeReservoir | LiyutanReservoir | DejiReservoir | ShigangDam | WusheReservoir
            | SunMoonLakeReservoir | JijiWeir | HushanReservoir | RenyitanReservoir
            | BaiheReservoir | WushantouReservoir | ZengwenReservoir | NanhuaReservoir
            | AgongdianReservoir | GaopingRiverWeir | MudanReservoir => Domain::Reservoir,
            EastElectricity | SouthElectricity | CentralElectricity | NorthElectricity => {
                Domain::Electricity
            }
            HsinchuEarthquake | TaichungEarthquake | TainanEarthquake => Domain::Earthquake,
        }
    }

    /// Name under which the reservoir source publishes this dam.
    pub fn dam_name(self) -> Option<&'static str> {
        use RulePosition::*;
        let name = match self {
            ShimenReservoir => "石門水庫",
            FeitsuiReservoir => "翡翠水庫",
            SecondBaoshanReservoir => "寶山第二水庫",
            YongheshanReservoir => "永和山水庫",
            MingdeReservoir => "明德水庫",
            LiyutanReservoir => "鯉魚潭水庫",
            DejiReservoir => "德基水庫",
            ShigangDam => "石岡壩",
            WusheReservoir => "霧社水庫",
            SunMoonLakeReservoir => "日月潭水庫",
            JijiWeir => "集集攔河堰",
            HushanReservoir => "湖山水庫",
            RenyitanReservoir => "仁義潭水庫",
            BaiheReservoir => "白河水庫",
            WushantouReservoir => "烏山頭水庫",
            ZengwenReservoir => "曾文水庫",
            NanhuaReservoir => "南化水庫",
            AgongdianReservoir => "阿公店水庫",
            GaopingRiverWeir => "高屏溪攔河堰",
            MudanReservoir => "牡丹水庫",
            _ => return None,
        };
        Some(name)
    }

    /// Grid sub-region: the position name with its `_ELECTRICITY` suffix removed.
    pub fn grid_region(self) -> Option<GridRegion> {
        match self {
            RulePosition::EastElectricity => Some(GridRegion::East),
            RulePosition::SouthElectricity => Some(GridRegion::South),
            RulePosition::CentralElectricity => Some(GridRegion::Central),
            RulePosition::NorthElectricity => Some(GridRegion::North),
            _ => None,
        }
    }

    /// Index into a seismic report's intensity triple.
    pub fn seismic_station(self) -> Option<usize> {
        match self {
            RulePosition::HsinchuEarthquake => Some(0),
            RulePosition::TaichungEarthquake => Some(1),
            RulePosition::TainanEarthquake => Some(2),
            _ => None,
        }
    }
}

impl fmt::Display for RulePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_value())
    }
}

/// Measured quantity at a position
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleResource {
    /// Reservoir effective storage volume
    #[sea_orm(string_value = "STORAGE")]
    Storage,
    /// Reservoir fill ratio, 0-100
    #[sea_orm(string_value = "PERCENT")]
    Percent,
    #[sea_orm(string_value = "LOAD")]
    Load,
    #[sea_orm(string_value = "MAX_SUPPLY")]
    MaxSupply,
    /// Grid reserve margin in percent
    #[sea_orm(string_value = "RECV_RATE")]
    RecvRate,
    /// Estimated seismic intensity at a station
    #[sea_orm(string_value = "INTENSITY")]
    Intensity,
}

impl RuleResource {
    /// Whether this quantity exists for positions of `domain`.
    pub fn applies_to(self, domain: Domain) -> bool {
        matches!(
            (domain, self),
            (Domain::Reservoir, RuleResource::Storage | RuleResource::Percent)
                | (
                    Domain::Electricity,
                    RuleResource::Load | RuleResource::MaxSupply | RuleResource::RecvRate
                )
                | (Domain::Earthquake, RuleResource::Intensity)
        )
    }
}

impl fmt::Display for RuleResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_value())
    }
}

/// Comparison applied as `measurement <op> threshold`
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleOperator {
    #[sea_orm(string_value = "EQUAL_TO")]
    EqualTo,
    #[sea_orm(string_value = "GREATER_THAN")]
    GreaterThan,
    #[sea_orm(string_value = "GREATER_THAN_OR_EQUAL_TO")]
    GreaterThanOrEqualTo,
    #[sea_orm(string_value = "LESS_THAN")]
    LessThan,
    #[sea_orm(string_value = "LESS_THAN_OR_EQUAL_TO")]
    LessThanOrEqualTo,
}

impl RuleOperator {
    /// Exact floating point comparison, no epsilon.
    #[allow(clippy::float_cmp)]
    pub fn check(self, value: f64, threshold: f64) -> bool {
        match self {
            RuleOperator::EqualTo => value == threshold,
            RuleOperator::GreaterThan => value > threshold,
            RuleOperator::GreaterThanOrEqualTo => value >= threshold,
            RuleOperator::LessThan => value < threshold,
            RuleOperator::LessThanOrEqualTo => value <= threshold,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            RuleOperator::EqualTo => "=",
            RuleOperator::GreaterThan => ">",
            RuleOperator::GreaterThanOrEqualTo => ">=",
            RuleOperator::LessThan => "<",
            RuleOperator::LessThanOrEqualTo => "<=",
        }
    }
}

impl fmt::Display for RuleOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_value())
    }
}

/// Payload for creating a rule
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateRule {
    #[schema(example = "Shimen running low")]
    pub name: Option<String>,
    pub position: RulePosition,
    pub resource: RuleResource,
    pub operator: RuleOperator,
    #[schema(example = 30.0)]
    pub value: f64,
}

/// Partial update; absent fields keep their stored value
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateRule {
    pub name: Option<String>,
    pub position: Option<RulePosition>,
    pub resource: Option<RuleResource>,
    pub operator: Option<RuleOperator>,
    pub value: Option<f64>,
}

/// Rule as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReadRule {
    pub id: i32,
    pub name: Option<String>,
    pub position: RulePosition,
    pub resource: RuleResource,
    pub operator: RuleOperator,
    pub value: f64,
    pub is_enable: bool,
    pub last_triggered_by: Option<i64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Model> for ReadRule {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            position: model.position,
            resource: model.resource,
            operator: model.operator,
            value: model.value,
            is_enable: model.is_enable,
            last_triggered_by: model.last_triggered_by,
            created_at: model.created_at.with_timezone(&chrono::Utc),
            updated_at: model.updated_at.with_timezone(&chrono::Utc),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Iterable;

    #[test]
    fn every_position_has_exactly_one_backing_lookup() {
        for position in RulePosition::iter() {
            let lookups = [
                position.dam_name().is_some(),
                position.grid_region().is_some(),
                position.seismic_station().is_some(),
            ];
            assert_eq!(
                lookups.iter().filter(|hit| **hit).count(),
                1,
                "{position} maps to more than one lookup"
            );

            let expected = match position.domain() {
                Domain::Reservoir => lookups[0],
                Domain::Electricity => lookups[1],
                Domain::Earthquake => lookups[2],
            };
            assert!(expected, "{position} lookup disagrees with its domain");
        }
    }

    #[test]
    fn grid_region_matches_position_name_without_suffix() {
        for position in RulePosition::iter().filter(|p| p.domain() == Domain::Electricity) {
            let region = position.grid_region().unwrap();
            let expected = position
                .to_string()
                .trim_end_matches("_ELECTRICITY")
                .to_lowercase();
            assert_eq!(region.key(), expected);
        }
    }

    #[test]
    fn resources_are_scoped_to_domains() {
        assert!(RuleResource::Storage.applies_to(Domain::Reservoir));
        assert!(RuleResource::Percent.applies_to(Domain::Reservoir));
        assert!(RuleResource::RecvRate.applies_to(Domain::Electricity));
        assert!(RuleResource::Intensity.applies_to(Domain::Earthquake));
        assert!(!RuleResource::Intensity.applies_to(Domain::Reservoir));
        assert!(!RuleResource::Storage.applies_to(Domain::Earthquake));
        assert!(!RuleResource::Load.applies_to(Domain::Reservoir));
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&RuleOperator::GreaterThanOrEqualTo).unwrap();
        assert_eq!(json, "\"GREATER_THAN_OR_EQUAL_TO\"");
        let position: RulePosition = serde_json::from_str("\"SUN_MOON_LAKE_RESERVOIR\"").unwrap();
        assert_eq!(position, RulePosition::SunMoonLakeReservoir);
        assert_eq!(position.to_string(), "SUN_MOON_LAKE_RESERVOIR");
    }

    #[test]
    fn display_name_falls_back_to_id() {
        let now = chrono::Utc::now().fixed_offset();
        let mut rule = Model {
            id: 42,
            user_id: 1,
            name: None,
            position: RulePosition::BaiheReservoir,
            resource: RuleResource::Storage,
            operator: RuleOperator::GreaterThan,
            value: 30.0,
            is_enable: true,
            last_triggered_by: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(rule.display_name(), "42");
        rule.name = Some("Baihe".to_string());
        assert_eq!(rule.display_name(), "Baihe");
    }
}
