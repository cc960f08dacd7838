//! Named numeric data gathered from scenes, managers and behaviors.
//!
//! Anything that wants to be observed implements [`DataPoints`] and
//! returns `(name, value)` pairs. The [`DataCollector`] turns those pairs
//! into [`Data`] series, keyed by name, ready to be serialized or
//! displayed by a telemetry layer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::scene::Scene;

/// Errors that can occur when building data series.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataError {
    /// A value was added to data that holds a single value.
    #[error("cannot add a value to single-value data")]
    SingleValue,
}

/// A source of named numeric values.
pub trait DataPoints {
    /// Current `(name, value)` pairs.
    fn data_points(&self) -> Vec<(&'static str, f64)>;
}

/// A data series: either one value from a single source or one sample per
/// source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Data {
    single: bool,
    values: Vec<f64>,
}

impl Data {
    /// Empty multi-sample data.
    pub const fn samples() -> Self {
        Self {
            single: false,
            values: Vec::new(),
        }
    }

    /// Data holding exactly one value.
    pub fn single(value: f64) -> Self {
        Self {
            single: true,
            values: vec![value],
        }
    }

    /// Return `true` if this data holds a single value.
    pub const fn is_single_value(&self) -> bool {
        self.single
    }

    /// The value of single-value data.
    pub fn value(&self) -> Option<f64> {
        if self.single {
            self.values.first().copied()
        } else {
            None
        }
    }

    /// Add one sample.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::SingleValue`] for single-value data.
    pub fn add_value(&mut self, value: f64) -> Result<(), DataError> {
        if self.single {
            return Err(DataError::SingleValue);
        }
        self.values.push(value);
        Ok(())
    }

    /// All samples in insertion order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Return `true` if there are no samples.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Arithmetic mean, or 0 with no samples.
    pub fn average(&self) -> f64 {
        mean(&self.values).unwrap_or(0.0)
    }

    /// Population standard deviation, or 0 with no samples.
    pub fn standard_deviation(&self) -> f64 {
        standard_deviation(&self.values)
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let count = values.len() as f64;
    Some(values.iter().sum::<f64>() / count)
}

/// Population standard deviation of `values`, or 0 when empty.
pub fn standard_deviation(values: &[f64]) -> f64 {
    let Some(avg) = mean(values) else {
        return 0.0;
    };
    let squares: Vec<f64> = values.iter().map(|v| (v - avg) * (v - avg)).collect();
    mean(&squares).unwrap_or(0.0).sqrt()
}

/// Gathers [`DataPoints`] into named series.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataCollector;

impl DataCollector {
    /// One sample per live entity for every data point its behavior
    /// reports.
    ///
    /// Behaviors that are running at the time of the call are skipped.
    pub fn collect(scene: &Scene) -> BTreeMap<String, Data> {
        let mut data: BTreeMap<String, Data> = BTreeMap::new();
        scene.for_each_behavior(|_, _, behavior| {
            for (name, value) in behavior.data_points() {
                push_sample(&mut data, name, value);
            }
        });
        data
    }

    /// One sample per source for every data point it reports.
    pub fn collect_many<'a, I>(sources: I) -> BTreeMap<String, Data>
    where
        I: IntoIterator<Item = &'a dyn DataPoints>,
    {
        let mut data: BTreeMap<String, Data> = BTreeMap::new();
        for source in sources {
            for (name, value) in source.data_points() {
                push_sample(&mut data, name, value);
            }
        }
        data
    }

    /// Single-value data for every data point of one source.
    pub fn collect_single(source: &dyn DataPoints) -> BTreeMap<String, Data> {
        source
            .data_points()
            .into_iter()
            .map(|(name, value)| (name.to_owned(), Data::single(value)))
            .collect()
    }

    /// Names of the data points one source reports.
    pub fn names(source: &dyn DataPoints) -> Vec<&'static str> {
        source.data_points().into_iter().map(|(name, _)| name).collect()
    }
}

fn push_sample(data: &mut BTreeMap<String, Data>, name: &str, value: f64) {
    let series = data.entry(name.to_owned()).or_insert_with(Data::samples);
    // Series created here are never single-valued.
    if series.add_value(value).is_err() {
        tracing::warn!(name, "Dropped sample for single-value data");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use flatworld_types::{Color, Point, Shape};

    use super::*;
    use crate::context::UpdateContext;
    use crate::entity::{Behavior, Entity};

    struct Radius(f64);

    impl Behavior for Radius {
        fn update(&mut self, _ctx: &mut UpdateContext<'_>) {}

        fn data_points(&self) -> Vec<(&'static str, f64)> {
            vec![("size", self.0), ("one", 1.0)]
        }
    }

    struct Fixed;

    impl DataPoints for Fixed {
        fn data_points(&self) -> Vec<(&'static str, f64)> {
            vec![("a", 2.0), ("b", 3.5)]
        }
    }

    #[test]
    fn standard_deviation_of_known_set() {
        let values = [10.0, 12.0, 23.0, 23.0, 16.0, 23.0, 21.0, 16.0];
        assert!((standard_deviation(&values) - 4.898_979_485_566_4).abs() < 1e-9);
        assert_eq!(standard_deviation(&[]), 0.0);
    }

    #[test]
    fn empty_data_averages_to_zero() {
        let data = Data::samples();
        assert_eq!(data.average(), 0.0);
        assert_eq!(data.standard_deviation(), 0.0);
        assert!(data.is_empty());
    }

    #[test]
    fn single_value_rejects_samples() {
        let mut data = Data::single(4.0);
        assert_eq!(data.add_value(1.0), Err(DataError::SingleValue));
        assert_eq!(data.value(), Some(4.0));
        assert_eq!(data.len(), 1);
        assert_eq!(data.average(), 4.0);
    }

    #[test]
    fn samples_accumulate() {
        let mut data = Data::samples();
        data.add_value(2.0).unwrap();
        data.add_value(4.0).unwrap();
        assert_eq!(data.average(), 3.0);
        assert_eq!(data.standard_deviation(), 1.0);
        assert_eq!(data.value(), None);
    }

    #[test]
    fn collect_from_scene_entities() {
        let scene = Scene::new(10.0, 10.0).unwrap();
        for size in [1.0, 2.0, 3.0] {
            scene.add(Entity::new(
                Shape::circle(Point::new(1.0, 1.0), 1.0),
                Color::WHITE,
                Radius(size),
            ));
        }
        let data = DataCollector::collect(&scene);
        assert_eq!(data.len(), 2);
        assert_eq!(data.get("size").map(Data::average), Some(2.0));
        assert_eq!(data.get("one").map(Data::len), Some(3));
    }

    #[test]
    fn collect_single_source() {
        let data = DataCollector::collect_single(&Fixed);
        assert_eq!(data.get("b").and_then(Data::value), Some(3.5));
        assert!(data.values().all(Data::is_single_value));
        assert_eq!(DataCollector::names(&Fixed), vec!["a", "b"]);
    }

    #[test]
    fn collect_many_sources() {
        let sources: [&dyn DataPoints; 2] = [&Fixed, &Fixed];
        let data = DataCollector::collect_many(sources);
        assert_eq!(data.get("a").map(Data::len), Some(2));
    }

    #[test]
    fn data_serializes() {
        let data = DataCollector::collect_single(&Fixed);
        let json = serde_json::to_string(&data).unwrap();
        assert!(json.contains("\"a\""));
    }
}
