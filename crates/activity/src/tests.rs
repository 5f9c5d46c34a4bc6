use std::{
    cell::RefCell,
    collections::HashMap,
    time::{Duration, Instant},
};

use super::*;

const GROWTH_LIMIT: Duration = Duration::from_millis(10);
const DECAY_RATE: Duration = Duration::from_secs(1);

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

fn counter(start: Instant) -> ActivityCounter {
    ActivityCounter::new(60, GROWTH_LIMIT, DECAY_RATE, start)
}

fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-5
}

/// Replays a fixed list of readings per channel, cycling when exhausted.
#[derive(Default)]
struct CyclingSource {
    readings: HashMap<Channel, Vec<Option<f32>>>,
    cursor: RefCell<HashMap<Channel, usize>>,
}

impl CyclingSource {
    fn with(channel: Channel, readings: &[Option<f32>]) -> Self {
        let mut source = Self::default();
        source.readings.insert(channel, readings.to_vec());
        source
    }
}

impl AnalogSource for CyclingSource {
    fn read(&self, channel: Channel) -> Option<f32> {
        let readings = self.readings.get(&channel)?;
        let mut cursor = self.cursor.borrow_mut();
        let index = cursor.entry(channel).or_default();
        let reading = readings[*index % readings.len()];
        *index += 1;
        reading
    }
}

#[test]
fn median_of_odd_and_even_lengths() {
    assert_eq!(Some(2.0), median(&mut [3.0, 1.0, 2.0]));
    assert_eq!(Some(2.5), median(&mut [4.0, 1.0, 3.0, 2.0]));
    assert_eq!(None, median(&mut []));
}

#[test]
fn sampler_ignores_null_readings() {
    let source = CyclingSource::with(
        0,
        &[
            Some(0.1),
            None,
            Some(0.3),
            Some(0.2),
            None,
            Some(0.25),
            Some(0.2),
            Some(0.15),
            Some(0.3),
        ],
    );
    let sampler = Sampler::new(8, ms(100), Duration::ZERO);

    // The eighth valid reading wraps around to the leading 0.1:
    // sorted 0.1 0.1 0.15 0.2 0.2 0.25 0.3 0.3 -> 0.2
    let sample = sampler.sample(&source, 0).unwrap();
    assert!(approx_eq(0.2, sample), "{sample}");
}

#[test]
fn sampler_rejects_spikes() {
    let source = CyclingSource::with(1, &[Some(0.4), Some(0.4), Some(1.0), Some(0.4), Some(0.0)]);
    let sampler = Sampler::new(5, ms(100), Duration::ZERO);

    assert_eq!(Ok(0.4), sampler.sample(&source, 1));
}

#[test]
fn sampler_times_out_on_a_silent_channel() {
    let source = CyclingSource::with(2, &[None]);
    let sampler = Sampler::new(8, ms(5), Duration::ZERO);

    let error = sampler.sample(&source, 2).unwrap_err();
    assert_eq!(
        SampleError::Starved {
            channel: 2,
            collected: 0,
            timeout: ms(5),
        },
        error
    );

    // Channels the source knows nothing about starve the same way
    assert!(sampler.sample(&source, 7).is_err());
}

#[test]
fn sampler_skips_non_finite_readings() {
    let source = CyclingSource::with(0, &[Some(f32::NAN), Some(0.5)]);
    let sampler = Sampler::new(3, ms(100), Duration::ZERO);

    assert_eq!(Ok(0.5), sampler.sample(&source, 0));
}

/// Always reads 0.5 and remembers when it was read.
#[derive(Default)]
struct TimedSource {
    reads: RefCell<Vec<Instant>>,
}

impl AnalogSource for TimedSource {
    fn read(&self, _channel: Channel) -> Option<f32> {
        self.reads.borrow_mut().push(Instant::now());
        Some(0.5)
    }
}

#[test]
fn sampler_spreads_readings_over_poll_interval() {
    let source = TimedSource::default();
    let sampler = Sampler::new(4, ms(500), ms(3));

    assert_eq!(Ok(0.5), sampler.sample(&source, 0));

    let reads = source.reads.borrow();
    assert_eq!(4, reads.len());
    for pair in reads.windows(2) {
        assert!(pair[1] - pair[0] >= ms(3), "{:?}", pair[1] - pair[0]);
    }
}

#[test]
fn counter_starts_at_rest() {
    let start = Instant::now();
    let counter = counter(start);

    assert_eq!(0, counter.value());
    assert_eq!(60, counter.max_value());
}

#[test]
fn counter_growth_is_debounced() {
    let start = Instant::now();
    let mut counter = counter(start);

    assert_eq!(5, counter.add(5, start + ms(20)));
    assert_eq!(0, counter.add(5, start + ms(25)));
    assert_eq!(5, counter.value());

    assert_eq!(3, counter.add(3, start + ms(31)));
    assert_eq!(8, counter.value());
}

#[test]
fn counter_growth_saturates_at_max() {
    let start = Instant::now();
    let mut counter = counter(start);

    assert_eq!(50, counter.add(50, start + ms(20)));
    assert_eq!(10, counter.add(50, start + ms(40)));
    assert_eq!(0, counter.add(50, start + ms(60)));
    assert_eq!(60, counter.value());
}

#[test]
fn counter_zero_growth_does_not_reset_debounce() {
    let start = Instant::now();
    let mut counter = counter(start);

    assert_eq!(0, counter.add(0, start + ms(20)));
    assert_eq!(2, counter.add(2, start + ms(21)));
}

#[test]
fn counter_decays_once_per_period() {
    let start = Instant::now();
    let mut counter = counter(start);
    counter.add(3, start + ms(20));

    assert!(!counter.tick(start + ms(500)));
    assert_eq!(3, counter.value());

    assert!(counter.tick(start + ms(1001)));
    assert_eq!(2, counter.value());

    // No catch-up: a long gap still only removes one unit
    assert!(!counter.tick(start + ms(1500)));
    assert!(counter.tick(start + ms(10_000)));
    assert_eq!(1, counter.value());
}

#[test]
fn counter_never_goes_negative_at_rest() {
    let start = Instant::now();
    let mut counter = counter(start);

    for second in 1..=10 {
        assert!(!counter.tick(start + ms(second * 1001)));
        assert_eq!(0, counter.value());
    }
}

#[test]
fn counter_stays_in_range_under_mixed_traffic() {
    let start = Instant::now();
    let mut counter = counter(start);

    for step in 0..2000u64 {
        let now = start + ms(step * 7);
        if step % 3 == 0 {
            counter.add((step % 17) as u32, now);
        }
        counter.tick(now);
        assert!(counter.value() <= counter.max_value());
    }
}

#[test]
fn single_burst_decays_back_to_rest() {
    let start = Instant::now();
    let mut counter = counter(start);
    let trigger = IrTrigger {
        threshold: 0.05,
        policy: GrowthPolicy::Proportional { step: 0.125 },
    };

    let mut now = start + ms(50);
    counter.add(trigger.units(0.5), now);
    assert_eq!(4, counter.value());

    // Sustained idle: tick every 50ms until the counter is back at rest
    let burst_end = now;
    while counter.value() > 0 {
        now += ms(50);
        counter.tick(now);
        assert!(now - burst_end < ms(5_000), "counter failed to decay");
    }
    assert!(now - burst_end > ms(3_000));
}

#[test]
fn speed_map_spans_range() {
    let mapper = SpeedMapper::new(0.6, 2.0);

    assert!(approx_eq(0.6, mapper.map(0, 60)));
    assert!(approx_eq(2.0, mapper.map(60, 60)));
    assert!(approx_eq(1.3, mapper.map(30, 60)));
    assert!(approx_eq(0.6, mapper.map(10, 0)));
}

#[test]
fn speed_map_is_monotonic() {
    let mapper = SpeedMapper::new(0.6, 2.0);

    let speeds: Vec<f32> = (0..=60).map(|value| mapper.map(value, 60)).collect();
    assert!(speeds.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[test]
fn speed_for_counter() {
    let start = Instant::now();
    let mut counter = counter(start);
    let mapper = SpeedMapper::new(0.6, 2.0);

    assert!(approx_eq(0.6, mapper.speed_for(&counter)));
    counter.add(60, start + ms(20));
    assert!(approx_eq(2.0, mapper.speed_for(&counter)));
}

#[test]
fn edge_detector_fires_on_rising_edges_only() {
    let mut edge = EdgeDetector::default();

    let fired = [0, 0, 1, 1, 1, 0, 1]
        .into_iter()
        .enumerate()
        .filter(|(_, state)| edge.update(*state == 1))
        .map(|(index, _)| index);

    itertools::assert_equal(fired, [2, 6]);
}

#[test]
fn felt_sensor_thresholds_samples() {
    let mut felt = FeltSensor::new(3, 0.9);

    assert!(!felt.update(0.2));
    assert!(felt.update(0.9));
    assert!(felt.is_touched());
    assert!(!felt.update(0.95));
    assert!(!felt.update(0.89));
    assert!(!felt.is_touched());
    assert!(felt.update(1.0));
}

#[test]
fn ir_sensor_primes_on_first_sample() {
    let mut ir = IrSensor::new(0);

    assert_eq!(0.0, ir.update(0.5));
    assert_eq!(0.25, ir.update(0.75));
    assert_eq!(-0.5, ir.update(0.25));
    assert_eq!(0.25, ir.value());
}

#[test]
fn ir_trigger_ignores_small_and_negative_deltas() {
    let trigger = IrTrigger {
        threshold: 0.05,
        policy: GrowthPolicy::default(),
    };

    assert_eq!(0, trigger.units(0.05));
    assert_eq!(0, trigger.units(-0.5));
}

#[test]
fn ir_trigger_growth_policies() {
    let unit = IrTrigger {
        threshold: 0.1,
        policy: GrowthPolicy::Unit,
    };
    let proportional = IrTrigger {
        threshold: 0.1,
        policy: GrowthPolicy::Proportional { step: 0.125 },
    };

    assert_eq!(1, unit.units(0.75));
    assert_eq!(6, proportional.units(0.75));
    assert_eq!(2, proportional.units(0.1875));
}
