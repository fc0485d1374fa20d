// SPDX-License-Identifier: MIT

//! Time-series stream data from the activity streams endpoint.
//!
//! Streams come back keyed by type when `key_by_type` is requested. The
//! arrays are NOT guaranteed to have equal lengths across keys: a missing
//! index means that sample is absent, not zero, so callers index through
//! [`StreamSet::sample`] rather than zipping arrays blindly.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

/// Stream families the sync core knows how to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKey {
    Time,
    LatLng,
    Altitude,
    Heartrate,
    Distance,
    VelocitySmooth,
}

impl StreamKey {
    /// Wire name used in the `keys` query parameter and response object.
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKey::Time => "time",
            StreamKey::LatLng => "latlng",
            StreamKey::Altitude => "altitude",
            StreamKey::Heartrate => "heartrate",
            StreamKey::Distance => "distance",
            StreamKey::VelocitySmooth => "velocity_smooth",
        }
    }

    /// Build the comma-separated `keys` parameter.
    pub fn join(keys: &[StreamKey]) -> String {
        keys.iter()
            .map(StreamKey::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One raw stream object in the keyed response.
#[derive(Debug, Clone, Deserialize)]
pub struct RawStream {
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
}

/// All streams fetched for one activity, keyed by wire name.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct StreamSet {
    streams: HashMap<String, RawStream>,
}

impl StreamSet {
    /// Number of samples in a stream, 0 when the stream is absent.
    pub fn len(&self, key: StreamKey) -> usize {
        self.streams.get(key.as_str()).map_or(0, |s| s.data.len())
    }

    pub fn is_empty(&self) -> bool {
        self.streams.values().all(|s| s.data.is_empty())
    }

    /// Scalar sample at `index`, or `None` when the stream is shorter.
    pub fn sample(&self, key: StreamKey, index: usize) -> Option<f64> {
        self.streams
            .get(key.as_str())
            .and_then(|s| s.data.get(index))
            .and_then(serde_json::Value::as_f64)
    }

    /// Lat/lng pair at `index`, or `None` when absent or malformed.
    pub fn latlng(&self, index: usize) -> Option<[f64; 2]> {
        let value = self
            .streams
            .get(StreamKey::LatLng.as_str())
            .and_then(|s| s.data.get(index))?;
        let pair = value.as_array()?;
        Some([pair.first()?.as_f64()?, pair.get(1)?.as_f64()?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> StreamSet {
        serde_json::from_str(json).expect("valid stream JSON")
    }

    #[test]
    fn test_unequal_stream_lengths_are_tolerated() {
        let set = parse(
            r#"{
                "time": {"data": [0, 1, 2, 3]},
                "heartrate": {"data": [80, 85]}
            }"#,
        );
        assert_eq!(set.len(StreamKey::Time), 4);
        assert_eq!(set.len(StreamKey::Heartrate), 2);
        assert_eq!(set.sample(StreamKey::Heartrate, 1), Some(85.0));
        // Short stream: missing index means absent, not zero
        assert_eq!(set.sample(StreamKey::Heartrate, 3), None);
    }

    #[test]
    fn test_missing_stream_is_empty() {
        let set = parse(r#"{"time": {"data": [0]}}"#);
        assert_eq!(set.len(StreamKey::Altitude), 0);
        assert_eq!(set.sample(StreamKey::Altitude, 0), None);
    }

    #[test]
    fn test_latlng_pairs() {
        let set = parse(r#"{"latlng": {"data": [[33.27, 131.50], [33.28, 131.51]]}}"#);
        assert_eq!(set.latlng(0), Some([33.27, 131.50]));
        assert_eq!(set.latlng(2), None);
    }

    #[test]
    fn test_keys_join() {
        let joined = StreamKey::join(&[StreamKey::Time, StreamKey::Heartrate]);
        assert_eq!(joined, "time,heartrate");
    }
}
