use indexmap::IndexMap;
use serde_json::Value;

/// Identifier for one sub-query stream, built from its split values.
/// Examples: `speciesKey=5352251`, `speciesKey=1,country=DE`, `all`
pub type StreamId = String;
/// Name of a field accepted by the occurrence search API.
/// Examples: `speciesKey`, `country`, `datasetKey`
pub type FieldName = String;
/// Media identifier as reported by the API; also the download URL.
/// Example: `https://bs.plantnet.org/image/o/6d5ed1f1769b4818ed5a234670dba742bf5b28a5`
pub type MediaUrl = String;
/// Content-addressed file stem (lowercase hex SHA-1 of the media URL).
/// Example: `e75239cd029162c81f16a6d6afb1057d2437bcc8`
pub type Basename = String;
/// Stringified label value taken from an occurrence.
/// Examples: `3189866`, `Plantae`
pub type LabelValue = String;
/// MIME content type string.
/// Examples: `image/jpeg`, `audio/mpeg`
pub type ContentType = String;
/// File suffix with a leading dot.
/// Examples: `.jpg`, `.mp3`
pub type Suffix = String;
/// Search filters keyed by API field name, in caller order.
///
/// Values are scalars, ranges encoded as strings (`"1990,2000"`), or arrays of
/// candidates.
pub type Query = IndexMap<FieldName, Value>;
