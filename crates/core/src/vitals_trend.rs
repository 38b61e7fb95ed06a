//! Vitals trend analysis.
//!
//! Each recorded sign is compared with its recent history: a least-squares slope across the
//! rolling window (the new reading included) flags `Trending`, and the new value alone is
//! checked against absolute bounds for `OutOfRange`. Flags are advisory and stored on the
//! reading itself.

use crate::config::ClinicalConfig;
use crate::constants::MIN_TREND_WINDOW;
use crate::model::{Measurement, PatientId, SessionId, VitalFlag, VitalSign, VitalsReading};
use crate::store::RecordStore;
use crate::{ClinicalError, ClinicalResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Least-squares slope of `values` against their index. `None` below two points.
pub fn slope(values: &[f64]) -> Option<f64> {
    if values.len() < MIN_TREND_WINDOW {
        return None;
    }
    let n = values.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n;

    let (num, den) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, y)| {
            let dx = i as f64 - mean_x;
            (num + dx * (y - mean_y), den + dx * dx)
        });
    Some(num / den)
}

/// Canonicalizes every measurement, rejecting the reading as a whole on the first bad value.
pub fn normalize(
    measurements: BTreeMap<VitalSign, Measurement>,
) -> ClinicalResult<BTreeMap<VitalSign, Measurement>> {
    if measurements.is_empty() {
        return Err(ClinicalError::InvalidInput(
            "vitals reading has no measurements".into(),
        ));
    }
    measurements
        .into_iter()
        .map(|(sign, m)| Ok((sign, m.to_canonical(sign)?)))
        .collect()
}

/// Flags for a new reading given the patient's earlier readings, oldest first.
pub fn analyze(
    config: &ClinicalConfig,
    history: &[VitalsReading],
    measurements: &BTreeMap<VitalSign, Measurement>,
) -> Vec<VitalFlag> {
    let mut flags = Vec::new();

    for (&sign, measurement) in measurements {
        let Some(threshold) = config.threshold(sign) else {
            continue;
        };

        if let Some(max_slope) = threshold.max_slope {
            let mut window: Vec<f64> = history
                .iter()
                .rev()
                .filter_map(|r| r.value(sign))
                .take(config.trend_window.saturating_sub(1))
                .collect();
            window.reverse();
            window.push(measurement.value);

            if let Some(s) = slope(&window) {
                if s.abs() > max_slope {
                    flags.push(VitalFlag::Trending {
                        sign,
                        slope: s,
                        threshold: max_slope,
                        window: window.len(),
                    });
                }
            }
        }

        let below = threshold.min.is_some_and(|min| measurement.value < min);
        let above = threshold.max.is_some_and(|max| measurement.value > max);
        if below || above {
            flags.push(VitalFlag::OutOfRange {
                sign,
                value: measurement.value,
                min: threshold.min,
                max: threshold.max,
            });
        }
    }

    flags
}

/// Normalizes, analyzes and stores a reading, returning it with its flags.
pub fn record_and_analyze(
    store: &dyn RecordStore,
    config: &ClinicalConfig,
    patient_id: &PatientId,
    measurements: BTreeMap<VitalSign, Measurement>,
    recorded_at: DateTime<Utc>,
    session_id: Option<SessionId>,
) -> ClinicalResult<VitalsReading> {
    let measurements = normalize(measurements)?;
    let history = store.get_vitals_history(patient_id)?;
    let flags = analyze(config, &history, &measurements);

    for flag in &flags {
        tracing::warn!(patient_id = %patient_id, sign = %flag.sign(), ?flag, "vital sign flagged");
    }

    let reading = VitalsReading {
        session_id,
        recorded_at,
        measurements,
        flags,
    };
    store.append_vitals(patient_id, reading.clone())?;
    Ok(reading)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub recorded_at: DateTime<Utc>,
    pub value: f64,
    pub flagged: bool,
}

/// Recent history of one sign with rolling statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VitalTrend {
    pub sign: VitalSign,
    pub points: Vec<TrendPoint>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub slope: Option<f64>,
}

/// The last `limit` readings of `sign`, oldest first.
pub fn trend_for(history: &[VitalsReading], sign: VitalSign, limit: usize) -> VitalTrend {
    let mut points: Vec<TrendPoint> = history
        .iter()
        .rev()
        .filter_map(|r| {
            r.value(sign).map(|value| TrendPoint {
                recorded_at: r.recorded_at,
                value,
                flagged: r.flags.iter().any(|f| f.sign() == sign),
            })
        })
        .take(limit)
        .collect();
    points.reverse();

    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
    let mean = (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64);

    VitalTrend {
        sign,
        min: values.iter().copied().reduce(f64::min),
        max: values.iter().copied().reduce(f64::max),
        mean,
        slope: slope(&values),
        points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VitalUnit;
    use crate::testing::{margaret, setup_store};

    fn reading(sign: VitalSign, value: f64, unit: VitalUnit) -> VitalsReading {
        VitalsReading {
            session_id: None,
            recorded_at: Utc::now(),
            measurements: BTreeMap::from([(sign, Measurement::new(value, unit))]),
            flags: Vec::new(),
        }
    }

    fn weights(values: &[f64]) -> Vec<VitalsReading> {
        values
            .iter()
            .map(|v| reading(VitalSign::Weight, *v, VitalUnit::Pounds))
            .collect()
    }

    fn single(sign: VitalSign, value: f64, unit: VitalUnit) -> BTreeMap<VitalSign, Measurement> {
        BTreeMap::from([(sign, Measurement::new(value, unit))])
    }

    #[test]
    fn test_slope_of_line() {
        assert_eq!(slope(&[1.0, 3.0, 5.0]), Some(2.0));
        assert_eq!(slope(&[7.0]), None);
    }

    #[test]
    fn test_rising_weight_flags_trending() {
        let config = ClinicalConfig::default();
        let history = weights(&[150.0, 151.0, 153.0, 155.0]);

        let flags = analyze(&config, &history, &single(VitalSign::Weight, 160.0, VitalUnit::Pounds));

        assert!(matches!(
            flags.as_slice(),
            [VitalFlag::Trending { sign: VitalSign::Weight, window: 5, slope, .. }] if (*slope - 2.4).abs() < 1e-9
        ));
    }

    #[test]
    fn test_slope_at_threshold_not_flagged() {
        let config = ClinicalConfig::default();
        let history = weights(&[150.0, 152.0, 154.0, 156.0]);

        let flags = analyze(&config, &history, &single(VitalSign::Weight, 158.0, VitalUnit::Pounds));
        assert!(flags.is_empty(), "{flags:?}");
    }

    #[test]
    fn test_window_ignores_older_readings() {
        let config = ClinicalConfig::default();
        let mut values = vec![100.0; 6];
        values.extend([150.0, 150.0, 150.0, 150.0]);
        let history = weights(&values);

        let flags = analyze(&config, &history, &single(VitalSign::Weight, 150.0, VitalUnit::Pounds));
        assert!(flags.is_empty(), "{flags:?}");
    }

    #[test]
    fn test_single_reading_only_checks_bounds() {
        let config = ClinicalConfig::default();
        let flags = analyze(&config, &[], &single(VitalSign::OxygenSaturation, 89.0, VitalUnit::Percent));

        assert_eq!(
            flags,
            vec![VitalFlag::OutOfRange {
                sign: VitalSign::OxygenSaturation,
                value: 89.0,
                min: Some(92.0),
                max: None,
            }]
        );
    }

    #[test]
    fn test_record_and_analyze_stores_flags() {
        let store = setup_store();
        let config = ClinicalConfig::default();
        let before = store.get_vitals_history(&margaret()).unwrap().len();

        let reading = record_and_analyze(
            &store,
            &config,
            &margaret(),
            single(VitalSign::BloodPressureSystolic, 172.0, VitalUnit::MmHg),
            Utc::now(),
            None,
        )
        .unwrap();

        assert!(reading
            .flags
            .iter()
            .any(|f| matches!(f, VitalFlag::OutOfRange { .. })));
        let history = store.get_vitals_history(&margaret()).unwrap();
        assert_eq!(history.len(), before + 1);
        assert_eq!(history.last().unwrap().flags, reading.flags);
    }

    #[test]
    fn test_invalid_measurement_stores_nothing() {
        let store = setup_store();
        let config = ClinicalConfig::default();
        let before = store.get_vitals_history(&margaret()).unwrap().len();

        let mut measurements = single(VitalSign::HeartRate, 70.0, VitalUnit::Bpm);
        measurements.insert(VitalSign::PainLevel, Measurement::new(-1.0, VitalUnit::Score));

        let err = record_and_analyze(&store, &config, &margaret(), measurements, Utc::now(), None)
            .unwrap_err();
        assert!(matches!(err, ClinicalError::InvalidMeasurement(_)));
        assert_eq!(store.get_vitals_history(&margaret()).unwrap().len(), before);
    }

    #[test]
    fn test_trend_for_reports_statistics() {
        let history = weights(&[150.0, 152.0, 154.0]);
        let trend = trend_for(&history, VitalSign::Weight, 2);

        assert_eq!(trend.points.len(), 2);
        assert_eq!(trend.min, Some(152.0));
        assert_eq!(trend.max, Some(154.0));
        assert_eq!(trend.mean, Some(153.0));
        assert_eq!(trend.slope, Some(2.0));
    }
}
