// core/perception.rs

// Single-beam ultrasonic ranging. A reading is either a distance in
// centimetres or `NoEcho`, which saturates to "nothing in range" and never
// blocks motion.

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::digital::v2::{InputPin, OutputPin};
use log::{debug, warn};
use std::time::Duration;

use crate::SensorConfig;
use crate::interface::Clock;

/// One rangefinder measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DistanceReading {
    /// Distance to the nearest echo
    Centimeters(f64),
    /// Echo never arrived (or never ended) before the timeout
    NoEcho,
}

impl DistanceReading {
    /// `true` when the reading is strictly closer than `threshold_cm`;
    /// `NoEcho` is never within any threshold
    pub fn is_within(&self, threshold_cm: f64) -> bool {
        match *self {
            DistanceReading::Centimeters(cm) => cm < threshold_cm,
            DistanceReading::NoEcho => false,
        }
    }

    /// Distance, if one was measured
    pub fn centimeters(&self) -> Option<f64> {
        match *self {
            DistanceReading::Centimeters(cm) => Some(cm),
            DistanceReading::NoEcho => None,
        }
    }
}

/// Anything that can take a single ranging measurement
pub trait RangeSensor {
    /// Take one measurement; never retries and never fails
    fn measure(&mut self) -> DistanceReading;
}

/// Timing constants of a trigger/echo ranger
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EchoTiming {
    /// Width of the trigger pulse
    pub trigger_pulse: Duration,
    /// Bound on the whole echo wait, from the start of the pulse
    pub timeout: Duration,
    /// Echo high-time per centimetre
    pub us_per_cm: f64,
}

impl From<&SensorConfig> for EchoTiming {
    fn from(config: &SensorConfig) -> Self {
        EchoTiming {
            trigger_pulse: Duration::from_micros(config.trigger_pulse_us),
            timeout: Duration::from_micros(config.echo_timeout_us),
            us_per_cm: config.us_per_cm,
        }
    }
}

/// HC-SR04 style ranger: pulse the trigger line, time the echo line
pub struct EchoRanger<T, E, C> {
    trigger: T,
    echo: E,
    clock: C,
    timing: EchoTiming,
}

impl<T, E, C> EchoRanger<T, E, C>
where
    T: OutputPin,
    E: InputPin,
    C: Clock + DelayUs<u32>,
{
    /// Build a ranger; the trigger line is driven low immediately
    pub fn new(mut trigger: T, echo: E, clock: C, timing: EchoTiming) -> Self {
        if trigger.set_low().is_err() {
            warn!("Trigger line could not be driven low");
        }
        EchoRanger {
            trigger,
            echo,
            clock,
            timing,
        }
    }

    // Busy-waits until the echo line reaches `level`; `None` past the deadline.
    fn wait_for(&self, level: bool, start: Duration) -> Option<Duration> {
        loop {
            let now = self.clock.now();
            // An unreadable line counts as low.
            if self.echo.is_high().unwrap_or(false) == level {
                return Some(now);
            }
            if now.saturating_sub(start) > self.timing.timeout {
                return None;
            }
        }
    }
}

impl<T, E, C> RangeSensor for EchoRanger<T, E, C>
where
    T: OutputPin,
    E: InputPin,
    C: Clock + DelayUs<u32>,
{
    fn measure(&mut self) -> DistanceReading {
        let start = self.clock.now();
        if self.trigger.set_high().is_err() {
            warn!("Trigger pulse failed");
            return DistanceReading::NoEcho;
        }
        let pulse_us = u32::try_from(self.timing.trigger_pulse.as_micros()).unwrap_or(u32::MAX);
        self.clock.delay_us(pulse_us);
        if self.trigger.set_low().is_err() {
            warn!("Trigger line stuck high");
        }

        let Some(rise) = self.wait_for(true, start) else {
            debug!("No echo within {:?}", self.timing.timeout);
            return DistanceReading::NoEcho;
        };
        let Some(fall) = self.wait_for(false, start) else {
            debug!("Echo still high after {:?}", self.timing.timeout);
            return DistanceReading::NoEcho;
        };

        let high_us = fall.saturating_sub(rise).as_secs_f64() * 1e6;
        DistanceReading::Centimeters(high_us / self.timing.us_per_cm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimClock, SimEcho, SimPin};

    fn timing() -> EchoTiming {
        EchoTiming {
            trigger_pulse: Duration::from_micros(10),
            timeout: Duration::from_micros(10_000),
            us_per_cm: 58.0,
        }
    }

    #[test]
    fn echo_width_scales_to_centimeters() {
        let clock = SimClock::with_tick(Duration::from_micros(1));
        let echo = SimEcho::new(clock.clone());
        echo.schedule(Duration::from_micros(100), Duration::from_micros(100 + 580));
        let mut ranger = EchoRanger::new(SimPin::new(), echo, clock, timing());

        let cm = ranger.measure().centimeters().unwrap();
        assert!((cm - 10.0).abs() < 0.1, "measured {}", cm);
    }

    #[test]
    fn silent_echo_line_saturates_to_no_echo() {
        let clock = SimClock::with_tick(Duration::from_micros(1));
        let echo = SimEcho::new(clock.clone());
        let mut ranger = EchoRanger::new(SimPin::new(), echo, clock.clone(), timing());

        assert_eq!(ranger.measure(), DistanceReading::NoEcho);
        assert!(clock.elapsed() <= Duration::from_micros(10_020));
    }

    #[test]
    fn stuck_high_echo_is_bounded_by_the_same_timeout() {
        let clock = SimClock::with_tick(Duration::from_micros(1));
        let echo = SimEcho::new(clock.clone());
        echo.schedule(Duration::from_micros(50), Duration::from_secs(1));
        let mut ranger = EchoRanger::new(SimPin::new(), echo, clock, timing());

        let reading = ranger.measure();
        assert_eq!(reading, DistanceReading::NoEcho);
        assert!(!reading.is_within(5.0));
    }

    #[test]
    fn proximity_is_strictly_below_threshold() {
        assert!(DistanceReading::Centimeters(4.9).is_within(5.0));
        assert!(!DistanceReading::Centimeters(5.0).is_within(5.0));
        assert!(!DistanceReading::Centimeters(172.4).is_within(5.0));
    }
}
