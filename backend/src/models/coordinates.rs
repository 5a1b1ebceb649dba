//! Geographic coordinate normalization.
//!
//! Validates typed decimal or degrees-minutes-seconds (DMS) input and converts it into a
//! canonical [`Coordinate`] together with the display string kept in `raw_text`.
//! Free-text coordinates coming back from document extraction are parsed here as well.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Absolute latitude bound in degrees.
pub const LATITUDE_LIMIT: f64 = 90.0;
/// Absolute longitude bound in degrees.
pub const LONGITUDE_LIMIT: f64 = 180.0;

/// Local, pre-submission validation failure.
///
/// The `Display` text is the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please enter a site name")]
    MissingSiteName,

    #[error("Please enter both latitude and longitude")]
    MissingDecimalField,

    #[error("Please fill all DMS fields (degrees, minutes, seconds)")]
    MissingDmsField,

    #[error("Please enter valid numeric coordinates")]
    NotNumeric,

    #[error("Latitude must be between -90 and 90")]
    LatitudeOutOfRange,

    #[error("Longitude must be between -180 and 180")]
    LongitudeOutOfRange,

    #[error("Please fill all DMS fields with valid numbers")]
    DmsNotNumeric,

    #[error("Latitude degrees must be between 0 and 90")]
    LatitudeDegreesOutOfRange,

    #[error("Longitude degrees must be between 0 and 180")]
    LongitudeDegreesOutOfRange,

    #[error("Minutes must be between 0 and 59")]
    MinutesOutOfRange,

    #[error("Seconds must be between 0 and 59.999")]
    SecondsOutOfRange,

    #[error("{axis} direction must be {expected}, got '{found}'")]
    InvalidDirection {
        axis: Axis,
        expected: &'static str,
        found: String,
    },
}

/// Which coordinate component a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    /// Upper bound for DMS degrees on this axis.
    pub fn degree_limit(self) -> f64 {
        match self {
            Axis::Latitude => LATITUDE_LIMIT,
            Axis::Longitude => LONGITUDE_LIMIT,
        }
    }

    fn direction_hint(self) -> &'static str {
        match self {
            Axis::Latitude => "N or S",
            Axis::Longitude => "E or W",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Latitude => write!(f, "Latitude"),
            Axis::Longitude => write!(f, "Longitude"),
        }
    }
}

/// Hemisphere letter attached to a DMS value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    N,
    S,
    E,
    W,
}

impl Direction {
    pub fn axis(self) -> Axis {
        match self {
            Direction::N | Direction::S => Axis::Latitude,
            Direction::E | Direction::W => Axis::Longitude,
        }
    }

    /// South and west produce negative decimal degrees.
    pub fn is_negative(self) -> bool {
        matches!(self, Direction::S | Direction::W)
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "N" => Ok(Direction::N),
            "S" => Ok(Direction::S),
            "E" => Ok(Direction::E),
            "W" => Ok(Direction::W),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Direction::N => "N",
            Direction::S => "S",
            Direction::E => "E",
            Direction::W => "W",
        };
        f.write_str(letter)
    }
}

/// How the coordinate was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateFormat {
    Decimal,
    Dms,
}

impl CoordinateFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            CoordinateFormat::Decimal => "decimal",
            CoordinateFormat::Dms => "dms",
        }
    }

    /// Lenient match for the free-form labels produced by document extraction.
    fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_ascii_lowercase();
        if label == "dms" || label.contains("minutes") || label.contains("dms") {
            Some(CoordinateFormat::Dms)
        } else if label.contains("decimal") {
            Some(CoordinateFormat::Decimal)
        } else {
            None
        }
    }
}

impl fmt::Display for CoordinateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One axis of a degrees-minutes-seconds coordinate. Transient, never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DmsValue {
    pub degrees: i32,
    pub minutes: i32,
    pub seconds: f64,
    pub direction: Direction,
}

impl DmsValue {
    pub fn new(degrees: i32, minutes: i32, seconds: f64, direction: Direction) -> Self {
        Self {
            degrees,
            minutes,
            seconds,
            direction,
        }
    }

    pub fn to_decimal(&self) -> f64 {
        dms_to_decimal(self.degrees, self.minutes, self.seconds, self.direction)
    }

    pub fn to_display(&self) -> String {
        format_dms_string(self.degrees, self.minutes, self.seconds, self.direction)
    }
}

/// Canonical geographic coordinate attached to a site.
///
/// `has_explicit_coordinates == true` implies both components are present and in range;
/// [`Coordinate::normalize`] restores that invariant for externally produced records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub raw_text: String,
    #[serde(
        default,
        deserialize_with = "lenient_format",
        skip_serializing_if = "Option::is_none"
    )]
    pub format: Option<CoordinateFormat>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub has_explicit_coordinates: bool,
    /// Passthrough fields such as `datum`.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Result of [`Coordinate::normalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateRepair {
    Unchanged,
    ParsedFromText,
    FlagCleared,
}

impl Coordinate {
    /// Build from validated decimal degrees.
    pub fn from_decimal(latitude: f64, longitude: f64) -> Result<Self, ValidationError> {
        validate_decimal(latitude, longitude)?;
        Ok(Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            raw_text: format!("{}, {}", latitude, longitude),
            format: Some(CoordinateFormat::Decimal),
            has_explicit_coordinates: true,
            extra: serde_json::Map::new(),
        })
    }

    /// Build from validated DMS components; `raw_text` keeps the DMS rendering.
    ///
    /// The converted pair must also be in decimal range: `90° 30' N` passes the component
    /// checks but is rejected here.
    pub fn from_dms(latitude: DmsValue, longitude: DmsValue) -> Result<Self, ValidationError> {
        validate_dms(&latitude, &longitude)?;
        let (lat, lon) = (latitude.to_decimal(), longitude.to_decimal());
        validate_decimal(lat, lon)?;
        Ok(Self {
            latitude: Some(lat),
            longitude: Some(lon),
            raw_text: format!("{}, {}", latitude.to_display(), longitude.to_display()),
            format: Some(CoordinateFormat::Dms),
            has_explicit_coordinates: true,
            extra: serde_json::Map::new(),
        })
    }

    /// Both components, only when present, finite and in range.
    pub fn explicit_pair(&self) -> Option<(f64, f64)> {
        let (lat, lon) = (self.latitude?, self.longitude?);
        validate_decimal(lat, lon).ok().map(|_| (lat, lon))
    }

    pub fn datum(&self) -> Option<&str> {
        self.extra.get("datum").and_then(|v| v.as_str())
    }

    /// Re-derive numeric components from `raw_text` and enforce the explicit-flag invariant.
    pub fn normalize(&mut self) -> CoordinateRepair {
        let mut repair = CoordinateRepair::Unchanged;
        if let Some((lat, lon)) = parse_coordinate_string(&self.raw_text) {
            if self.latitude != Some(lat) || self.longitude != Some(lon) || !self.has_explicit_coordinates {
                repair = CoordinateRepair::ParsedFromText;
            }
            self.latitude = Some(lat);
            self.longitude = Some(lon);
            self.has_explicit_coordinates = true;
        }
        if self.has_explicit_coordinates && self.explicit_pair().is_none() {
            self.has_explicit_coordinates = false;
            repair = CoordinateRepair::FlagCleared;
        }
        repair
    }
}

/// Validate decimal degrees; each violated bound has its own message.
pub fn validate_decimal(latitude: f64, longitude: f64) -> Result<(), ValidationError> {
    if latitude.is_nan() || longitude.is_nan() {
        return Err(ValidationError::NotNumeric);
    }
    if !(-LATITUDE_LIMIT..=LATITUDE_LIMIT).contains(&latitude) {
        return Err(ValidationError::LatitudeOutOfRange);
    }
    if !(-LONGITUDE_LIMIT..=LONGITUDE_LIMIT).contains(&longitude) {
        return Err(ValidationError::LongitudeOutOfRange);
    }
    Ok(())
}

/// Validate both DMS axes.
///
/// Degrees are bounded per axis, minutes lie in `[0, 60)` and seconds in `[0, 60)`.
pub fn validate_dms(latitude: &DmsValue, longitude: &DmsValue) -> Result<(), ValidationError> {
    if latitude.seconds.is_nan() || longitude.seconds.is_nan() {
        return Err(ValidationError::DmsNotNumeric);
    }

    if !(0.0..=Axis::Latitude.degree_limit()).contains(&f64::from(latitude.degrees)) {
        return Err(ValidationError::LatitudeDegreesOutOfRange);
    }
    if !(0.0..=Axis::Longitude.degree_limit()).contains(&f64::from(longitude.degrees)) {
        return Err(ValidationError::LongitudeDegreesOutOfRange);
    }

    for value in [latitude, longitude] {
        if !(0..60).contains(&value.minutes) {
            return Err(ValidationError::MinutesOutOfRange);
        }
    }
    for value in [latitude, longitude] {
        if !(0.0..60.0).contains(&value.seconds) {
            return Err(ValidationError::SecondsOutOfRange);
        }
    }

    check_direction(latitude.direction, Axis::Latitude)?;
    check_direction(longitude.direction, Axis::Longitude)?;
    Ok(())
}

fn check_direction(direction: Direction, axis: Axis) -> Result<(), ValidationError> {
    if direction.axis() == axis {
        return Ok(());
    }
    Err(ValidationError::InvalidDirection {
        axis,
        expected: axis.direction_hint(),
        found: direction.to_string(),
    })
}

/// Convert DMS to decimal degrees.
///
/// The sign of `degrees` is discarded before the hemisphere is applied, so `-40 N`
/// converts to the same value as `40 N`.
pub fn dms_to_decimal(degrees: i32, minutes: i32, seconds: f64, direction: Direction) -> f64 {
    let decimal = f64::from(degrees).abs() + f64::from(minutes) / 60.0 + seconds / 3600.0;
    if direction.is_negative() {
        -decimal
    } else {
        decimal
    }
}

/// Canonical DMS rendering, e.g. `40° 26' 46.123" N`.
pub fn format_dms_string(degrees: i32, minutes: i32, seconds: f64, direction: Direction) -> String {
    format!("{}° {}' {:.3}\" {}", degrees, minutes, seconds, direction)
}

/// Parse free text of the form `"<lat>, <lon>"` into decimal degrees.
///
/// Each part may be decimal (`-33.45`, `33.45 S`) or DMS (`40° 26' 46" N`, `40 26 46 N`).
/// Returns `None` unless both parts parse.
pub fn parse_coordinate_string(text: &str) -> Option<(f64, f64)> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    if parts.len() != 2 {
        return None;
    }
    Some((parse_single_coordinate(parts[0])?, parse_single_coordinate(parts[1])?))
}

fn parse_single_coordinate(part: &str) -> Option<f64> {
    let mut value = part.trim();
    let last = value.chars().last()?;

    let mut sign = 1.0;
    match last.to_ascii_uppercase() {
        'S' | 'W' => {
            sign = -1.0;
            value = value[..value.len() - last.len_utf8()].trim();
        }
        'N' | 'E' => {
            value = value[..value.len() - last.len_utf8()].trim();
        }
        _ => {}
    }
    let value = value.trim_end_matches('°');

    let tokens: Vec<&str> = value
        .split(|c: char| matches!(c, '°' | '′' | '\'' | '″' | '"') || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();

    let decimal = match tokens.as_slice() {
        [degrees, minutes, seconds] => {
            let degrees: i64 = degrees.parse().ok()?;
            let minutes: f64 = minutes.parse().ok()?;
            let seconds: f64 = seconds.parse().ok()?;
            if minutes < 0.0 || seconds < 0.0 {
                return None;
            }
            let magnitude = degrees.unsigned_abs() as f64 + minutes / 60.0 + seconds / 3600.0;
            if degrees < 0 {
                -magnitude
            } else {
                magnitude
            }
        }
        [single] => single.parse::<f64>().ok()?,
        _ => return None,
    };

    let decimal = decimal * sign;
    decimal.is_finite().then_some(decimal)
}

/// Raw strings typed into the manual entry form, tagged by coordinate format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum ManualCoordinateInput {
    Decimal {
        #[serde(deserialize_with = "form_text")]
        latitude: String,
        #[serde(deserialize_with = "form_text")]
        longitude: String,
    },
    Dms { latitude: DmsFields, longitude: DmsFields },
}

/// One DMS axis as typed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DmsFields {
    #[serde(default, deserialize_with = "form_text")]
    pub degrees: String,
    #[serde(default, deserialize_with = "form_text")]
    pub minutes: String,
    #[serde(default, deserialize_with = "form_text")]
    pub seconds: String,
    #[serde(default)]
    pub direction: String,
}

impl DmsFields {
    fn is_incomplete(&self) -> bool {
        [&self.degrees, &self.minutes, &self.seconds]
            .iter()
            .any(|field| field.trim().is_empty())
    }

    fn parse(&self, axis: Axis) -> Result<DmsValue, ValidationError> {
        let degrees = parse_int_field(&self.degrees).ok_or(ValidationError::DmsNotNumeric)?;
        let minutes = parse_int_field(&self.minutes).ok_or(ValidationError::DmsNotNumeric)?;
        let seconds = parse_float_field(&self.seconds);
        let direction = match self.direction.trim() {
            "" => match axis {
                Axis::Latitude => Direction::N,
                Axis::Longitude => Direction::E,
            },
            raw => raw
                .parse::<Direction>()
                .map_err(|found| ValidationError::InvalidDirection {
                    axis,
                    expected: axis.direction_hint(),
                    found,
                })?,
        };
        Ok(DmsValue::new(degrees, minutes, seconds, direction))
    }
}

impl ManualCoordinateInput {
    pub fn format(&self) -> CoordinateFormat {
        match self {
            ManualCoordinateInput::Decimal { .. } => CoordinateFormat::Decimal,
            ManualCoordinateInput::Dms { .. } => CoordinateFormat::Dms,
        }
    }

    /// Check required fields, parse, validate and convert.
    pub fn to_coordinate(&self) -> Result<Coordinate, ValidationError> {
        match self {
            ManualCoordinateInput::Decimal {
                latitude,
                longitude,
            } => {
                if latitude.trim().is_empty() || longitude.trim().is_empty() {
                    return Err(ValidationError::MissingDecimalField);
                }
                Coordinate::from_decimal(parse_float_field(latitude), parse_float_field(longitude))
            }
            ManualCoordinateInput::Dms {
                latitude,
                longitude,
            } => {
                if latitude.is_incomplete() || longitude.is_incomplete() {
                    return Err(ValidationError::MissingDmsField);
                }
                let lat = latitude.parse(Axis::Latitude)?;
                let lon = longitude.parse(Axis::Longitude)?;
                Coordinate::from_dms(lat, lon)
            }
        }
    }
}

/// Float field; unparseable text becomes NaN and fails the numeric check.
fn parse_float_field(field: &str) -> f64 {
    field.trim().parse::<f64>().unwrap_or(f64::NAN)
}

/// Integer field; fractional input is truncated toward zero.
fn parse_int_field(field: &str) -> Option<i32> {
    let value = field.trim().parse::<f64>().ok()?;
    if !value.is_finite() || value.abs() > f64::from(i32::MAX) {
        return None;
    }
    Some(value.trunc() as i32)
}

/// Treat an explicit JSON `null` like a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Form fields arrive as text, but JSON clients may send numbers.
fn form_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(String::new()),
        Some(serde_json::Value::String(text)) => Ok(text),
        Some(serde_json::Value::Number(number)) => Ok(number.to_string()),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected text or a number, got {other}"
        ))),
    }
}

fn lenient_format<'de, D>(deserializer: D) -> Result<Option<CoordinateFormat>, D::Error>
where
    D: Deserializer<'de>,
{
    let label = Option::<String>::deserialize(deserializer)?;
    Ok(label.as_deref().and_then(CoordinateFormat::from_label))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_validate_decimal_bounds() {
        assert!(validate_decimal(90.0, 180.0).is_ok());
        assert!(validate_decimal(-90.0, -180.0).is_ok());
        assert_eq!(
            validate_decimal(90.0001, 0.0),
            Err(ValidationError::LatitudeOutOfRange)
        );
        assert_eq!(
            validate_decimal(0.0, 180.0001),
            Err(ValidationError::LongitudeOutOfRange)
        );
        assert_eq!(
            validate_decimal(f64::NAN, 0.0),
            Err(ValidationError::NotNumeric)
        );
    }

    #[test]
    fn test_validate_decimal_messages() {
        assert_eq!(
            ValidationError::LatitudeOutOfRange.to_string(),
            "Latitude must be between -90 and 90"
        );
        assert_eq!(
            ValidationError::LongitudeOutOfRange.to_string(),
            "Longitude must be between -180 and 180"
        );
    }

    #[test]
    fn test_dms_to_decimal_hemispheres() {
        assert_close(dms_to_decimal(40, 26, 46.0, Direction::N), 40.446111);
        assert_close(dms_to_decimal(40, 26, 46.0, Direction::S), -40.446111);
        assert_close(dms_to_decimal(79, 58, 56.0, Direction::W), -79.982222);
    }

    #[test]
    fn test_dms_to_decimal_discards_degree_sign() {
        assert_close(
            dms_to_decimal(-40, 26, 46.0, Direction::N),
            dms_to_decimal(40, 26, 46.0, Direction::N),
        );
        assert_close(dms_to_decimal(-40, 26, 46.0, Direction::S), -40.446111);
    }

    #[test]
    fn test_format_dms_string() {
        assert_eq!(
            format_dms_string(40, 26, 46.123, Direction::N),
            "40° 26' 46.123\" N"
        );
        assert_eq!(format_dms_string(5, 0, 0.0, Direction::W), "5° 0' 0.000\" W");
    }

    #[test]
    fn test_validate_dms_seconds_upper_bound() {
        let ok = DmsValue::new(10, 0, 59.999, Direction::N);
        let lon_ok = DmsValue::new(10, 0, 59.999, Direction::E);
        assert!(validate_dms(&ok, &lon_ok).is_ok());

        let bad_lat = DmsValue::new(10, 0, 60.0, Direction::N);
        assert_eq!(
            validate_dms(&bad_lat, &lon_ok),
            Err(ValidationError::SecondsOutOfRange)
        );
        let bad_lon = DmsValue::new(10, 0, 60.0, Direction::E);
        assert_eq!(
            validate_dms(&ok, &bad_lon),
            Err(ValidationError::SecondsOutOfRange)
        );
    }

    #[test]
    fn test_validate_dms_degree_and_minute_bounds() {
        let lon = DmsValue::new(0, 0, 0.0, Direction::E);
        assert_eq!(
            validate_dms(&DmsValue::new(91, 0, 0.0, Direction::N), &lon),
            Err(ValidationError::LatitudeDegreesOutOfRange)
        );
        assert_eq!(
            validate_dms(&DmsValue::new(-1, 0, 0.0, Direction::N), &lon),
            Err(ValidationError::LatitudeDegreesOutOfRange)
        );
        let lat = DmsValue::new(0, 0, 0.0, Direction::N);
        assert_eq!(
            validate_dms(&lat, &DmsValue::new(181, 0, 0.0, Direction::E)),
            Err(ValidationError::LongitudeDegreesOutOfRange)
        );
        assert_eq!(
            validate_dms(&lat, &DmsValue::new(180, 60, 0.0, Direction::E)),
            Err(ValidationError::MinutesOutOfRange)
        );
        assert!(validate_dms(&DmsValue::new(90, 59, 0.0, Direction::S), &lon).is_ok());
    }

    #[test]
    fn test_from_dms_rejects_pole_overflow() {
        let lat = DmsValue::new(90, 59, 30.0, Direction::N);
        let lon = DmsValue::new(180, 59, 30.0, Direction::E);
        assert!(validate_dms(&lat, &lon).is_ok());
        assert_eq!(
            Coordinate::from_dms(lat, DmsValue::new(10, 0, 0.0, Direction::E)).map(|_| ()),
            Err(ValidationError::LatitudeOutOfRange)
        );
        assert_eq!(
            Coordinate::from_dms(DmsValue::new(10, 0, 0.0, Direction::N), lon).map(|_| ()),
            Err(ValidationError::LongitudeOutOfRange)
        );

        let edge = Coordinate::from_dms(
            DmsValue::new(90, 0, 0.0, Direction::S),
            DmsValue::new(180, 0, 0.0, Direction::W),
        )
        .unwrap();
        assert_eq!(edge.explicit_pair(), Some((-90.0, -180.0)));
    }

    #[test]
    fn test_manual_input_accepts_json_numbers() {
        let input: ManualCoordinateInput = serde_json::from_value(serde_json::json!({
            "format": "decimal",
            "latitude": 36.67,
            "longitude": -41
        }))
        .unwrap();
        assert_eq!(
            input,
            ManualCoordinateInput::Decimal {
                latitude: "36.67".into(),
                longitude: "-41".into(),
            }
        );

        let input: ManualCoordinateInput = serde_json::from_value(serde_json::json!({
            "format": "dms",
            "latitude": { "degrees": 40, "minutes": 26, "seconds": 46.5, "direction": "N" },
            "longitude": { "degrees": "79", "minutes": null, "seconds": 0, "direction": "W" }
        }))
        .unwrap();
        let ManualCoordinateInput::Dms { latitude, longitude } = input else {
            panic!("expected dms input");
        };
        assert_eq!(latitude.seconds, "46.5");
        assert_eq!(longitude.minutes, "");

        let bad = serde_json::from_value::<ManualCoordinateInput>(serde_json::json!({
            "format": "decimal",
            "latitude": [1],
            "longitude": "2"
        }));
        assert!(bad.is_err());
    }

    #[test]
    fn test_validate_dms_rejects_swapped_directions() {
        let lat = DmsValue::new(10, 0, 0.0, Direction::E);
        let lon = DmsValue::new(10, 0, 0.0, Direction::W);
        assert!(matches!(
            validate_dms(&lat, &lon),
            Err(ValidationError::InvalidDirection {
                axis: Axis::Latitude,
                ..
            })
        ));
    }

    #[test]
    fn test_parse_coordinate_string_decimal() {
        assert_eq!(parse_coordinate_string("12.5, -45.25"), Some((12.5, -45.25)));
        assert_eq!(parse_coordinate_string("12.5 S, 45.25 W"), Some((-12.5, -45.25)));
        assert_eq!(parse_coordinate_string("12.5°N, 45.25°E"), Some((12.5, 45.25)));
    }

    #[test]
    fn test_parse_coordinate_string_dms() {
        let (lat, lon) =
            parse_coordinate_string("40° 26' 46.123\" N, 79° 58' 56\" W").expect("dms parses");
        assert_close(lat, 40.0 + 26.0 / 60.0 + 46.123 / 3600.0);
        assert_close(lon, -(79.0 + 58.0 / 60.0 + 56.0 / 3600.0));

        let (lat, _) = parse_coordinate_string("-33 27 0, 70 40 0 W").expect("dms parses");
        assert_close(lat, -33.45);
    }

    #[test]
    fn test_parse_coordinate_string_rejects_garbage() {
        assert_eq!(parse_coordinate_string(""), None);
        assert_eq!(parse_coordinate_string("Near the river"), None);
        assert_eq!(parse_coordinate_string("12.5"), None);
        assert_eq!(parse_coordinate_string("1, 2, 3"), None);
        assert_eq!(parse_coordinate_string("north, 45"), None);
    }

    #[test]
    fn test_manual_decimal_input() {
        let input = ManualCoordinateInput::Decimal {
            latitude: " 40.5 ".to_string(),
            longitude: "-3".to_string(),
        };
        let coordinate = input.to_coordinate().unwrap();
        assert_eq!(coordinate.raw_text, "40.5, -3");
        assert_eq!(coordinate.format, Some(CoordinateFormat::Decimal));
        assert!(coordinate.has_explicit_coordinates);
    }

    #[test]
    fn test_manual_decimal_missing_and_non_numeric() {
        let missing = ManualCoordinateInput::Decimal {
            latitude: "10".to_string(),
            longitude: "  ".to_string(),
        };
        assert_eq!(
            missing.to_coordinate(),
            Err(ValidationError::MissingDecimalField)
        );

        let garbage = ManualCoordinateInput::Decimal {
            latitude: "ten".to_string(),
            longitude: "20".to_string(),
        };
        assert_eq!(garbage.to_coordinate(), Err(ValidationError::NotNumeric));
    }

    #[test]
    fn test_manual_dms_input() {
        let input = ManualCoordinateInput::Dms {
            latitude: DmsFields {
                degrees: "40".into(),
                minutes: "26".into(),
                seconds: "46".into(),
                direction: "N".into(),
            },
            longitude: DmsFields {
                degrees: "79".into(),
                minutes: "58".into(),
                seconds: "56".into(),
                direction: "w".into(),
            },
        };
        let coordinate = input.to_coordinate().unwrap();
        assert_eq!(
            coordinate.raw_text,
            "40° 26' 46.000\" N, 79° 58' 56.000\" W"
        );
        assert_close(coordinate.latitude.unwrap(), 40.446111);
        assert_close(coordinate.longitude.unwrap(), -79.982222);
        assert_eq!(coordinate.format, Some(CoordinateFormat::Dms));
    }

    #[test]
    fn test_manual_dms_missing_field() {
        let input = ManualCoordinateInput::Dms {
            latitude: DmsFields {
                degrees: "40".into(),
                minutes: "".into(),
                seconds: "1".into(),
                direction: "N".into(),
            },
            longitude: DmsFields::default(),
        };
        assert_eq!(input.to_coordinate(), Err(ValidationError::MissingDmsField));
    }

    #[test]
    fn test_manual_dms_truncates_fractional_degrees() {
        let input = ManualCoordinateInput::Dms {
            latitude: DmsFields {
                degrees: "40.9".into(),
                minutes: "0".into(),
                seconds: "0".into(),
                direction: "N".into(),
            },
            longitude: DmsFields {
                degrees: "10".into(),
                minutes: "0".into(),
                seconds: "0".into(),
                direction: "E".into(),
            },
        };
        let coordinate = input.to_coordinate().unwrap();
        assert_eq!(coordinate.latitude, Some(40.0));
    }

    #[test]
    fn test_normalize_parses_raw_text() {
        let mut coordinate: Coordinate = serde_json::from_value(serde_json::json!({
            "raw_text": "10.5, 20.25",
            "latitude": null,
            "longitude": null,
            "has_explicit_coordinates": false,
            "format": "decimal degrees",
            "datum": "WGS84"
        }))
        .unwrap();
        assert_eq!(coordinate.normalize(), CoordinateRepair::ParsedFromText);
        assert_eq!(coordinate.explicit_pair(), Some((10.5, 20.25)));
        assert_eq!(coordinate.format, Some(CoordinateFormat::Decimal));
        assert_eq!(coordinate.datum(), Some("WGS84"));
    }

    #[test]
    fn test_normalize_clears_unbacked_flag() {
        let mut coordinate: Coordinate = serde_json::from_value(serde_json::json!({
            "raw_text": "somewhere east of the hill",
            "latitude": 95.0,
            "longitude": 10.0,
            "has_explicit_coordinates": true
        }))
        .unwrap();
        assert_eq!(coordinate.normalize(), CoordinateRepair::FlagCleared);
        assert!(!coordinate.has_explicit_coordinates);
    }

    #[test]
    fn test_coordinate_null_fields_deserialize() {
        let coordinate: Coordinate = serde_json::from_value(serde_json::json!({
            "raw_text": null,
            "has_explicit_coordinates": null
        }))
        .unwrap();
        assert_eq!(coordinate.raw_text, "");
        assert!(!coordinate.has_explicit_coordinates);
        assert_eq!(coordinate.latitude, None);
    }
}
