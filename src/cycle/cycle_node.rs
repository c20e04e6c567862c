//! Nodes that drive a [`ProcessingCycle`](../struct.ProcessingCycle.html)
//! from channel-connected sensor sources.
//!
//! Raw samples arrive on crossbeam channels. Each input keeps the newest
//! sample it has seen, so a cycle that finds no fresh data simply filters the
//! previous value again. Nothing is published until the primary channel has
//! delivered its first sample, and a channel that has never delivered is left
//! out of the record. A channel's filters are reset to its first sample. When a cycle runs is decided by a [`Schedule`]:
//!
//! * [`OnNewData`] runs one cycle per sample published on the primary
//!   channel (acceleration if configured, otherwise angular rate).
//! * [`FixedPeriod`] runs cycles at the configured step interval, sleeping
//!   out whatever part of the period processing did not use.
//!
//! # Example
//!
//! ```
//! #[macro_use] extern crate imu_filter_rs;
//! use imu_filter_rs::config::FilterConfig;
//! use imu_filter_rs::cycle::cycle_node;
//! use imu_filter_rs::cycle::{ResultRecord, SampleRecord};
//! use imu_filter_rs::prelude::*;
//!
//! # fn main() {
//! let mut node = cycle_node::on_new_data_node(&FilterConfig::gyro_only()).unwrap();
//! let (send, recv) = channel::unbounded();
//! node.inputs.gyro.receiver = Some(recv);
//! let (out_send, out_recv) = channel::unbounded::<ResultRecord>();
//! node.sender.push(out_send);
//!
//! for n in 0..10 {
//!     send.send(SampleRecord::new(n * 2500, [0.0, 0.0, 0.1])).unwrap();
//! }
//! drop(send);
//! let handles = start_nodes!(node);
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//! assert_eq!(out_recv.iter().count(), 10);
//! # }
//! ```

use crate::config::{ConfigError, FilterConfig};
use crate::cycle::{ProcessingCycle, ResultRecord, SampleRecord};
use crate::prelude::*;
use crossbeam::channel::TryRecvError;
use std::time::{Duration, Instant};

/// A channel receiver together with the newest sample taken from it.
#[derive(Default)]
pub struct InputPort {
    pub receiver: NodeReceiver<SampleRecord>,
    latest: Option<SampleRecord>,
}

impl InputPort {
    pub fn is_connected(&self) -> bool {
        self.receiver.is_some()
    }

    /// The newest sample, or `None` if the channel has not delivered yet.
    pub fn latest(&self) -> Option<&SampleRecord> {
        self.latest.as_ref()
    }

    /// Takes everything queued without blocking and keeps the newest sample.
    ///
    /// Returns `Ok(true)` if anything arrived. An unconnected port never has
    /// data. Fails with `CommError` once the sender is gone and nothing is
    /// left to read.
    pub fn poll(&mut self) -> Result<bool, NodeError> {
        let recv = match self.receiver {
            Some(ref r) => r,
            None => return Ok(false),
        };
        let mut updated = false;
        loop {
            match recv.try_recv() {
                Ok(sample) => {
                    self.latest = Some(sample);
                    updated = true;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if updated {
                        break;
                    }
                    return Err(NodeError::CommError);
                }
            }
        }
        Ok(updated)
    }

    /// Blocks until exactly one new sample arrives.
    pub fn wait(&mut self) -> Result<(), NodeError> {
        let sample = match self.receiver {
            Some(ref r) => r.recv().map_err(|_| NodeError::CommError)?,
            None => return Err(NodeError::PermanentError),
        };
        self.latest = Some(sample);
        Ok(())
    }
}

/// Which sensor channel paces an edge triggered node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Channel {
    Accel,
    Gyro,
}

/// The sensor inputs of a filtering node.
pub struct SensorInputs {
    pub accel: InputPort,
    pub gyro: InputPort,
    primary: Channel,
    secondary_closed: bool,
}

impl SensorInputs {
    pub fn new(primary: Channel) -> SensorInputs {
        SensorInputs {
            accel: InputPort::default(),
            gyro: InputPort::default(),
            primary,
            secondary_closed: false,
        }
    }

    pub fn primary_channel(&self) -> Channel {
        self.primary
    }

    pub fn primary(&self) -> &InputPort {
        match self.primary {
            Channel::Accel => &self.accel,
            Channel::Gyro => &self.gyro,
        }
    }

    pub fn primary_mut(&mut self) -> &mut InputPort {
        match self.primary {
            Channel::Accel => &mut self.accel,
            Channel::Gyro => &mut self.gyro,
        }
    }

    pub fn secondary_mut(&mut self) -> &mut InputPort {
        match self.primary {
            Channel::Accel => &mut self.gyro,
            Channel::Gyro => &mut self.accel,
        }
    }

    /// Refreshes the secondary input. A silent or closed secondary channel
    /// only means its last value is reused.
    pub fn poll_secondary(&mut self) {
        if self.secondary_mut().poll().is_err() && !self.secondary_closed {
            self.secondary_closed = true;
            warn!("secondary input disconnected, reusing its last sample");
        }
    }
}

/// Decides when the next cycle runs and refreshes the inputs for it.
pub trait Schedule: Send {
    fn wait(&mut self, inputs: &mut SensorInputs) -> Result<(), NodeError>;
}

/// Runs a cycle each time the primary channel publishes a sample.
#[derive(Clone, Copy, Debug, Default)]
pub struct OnNewData;

impl Schedule for OnNewData {
    fn wait(&mut self, inputs: &mut SensorInputs) -> Result<(), NodeError> {
        inputs.primary_mut().wait()?;
        inputs.poll_secondary();
        Ok(())
    }
}

/// Runs cycles at a fixed period, using whatever data is newest.
#[derive(Clone, Debug)]
pub struct FixedPeriod {
    period: Duration,
    last_start: Option<Instant>,
    overruns: u64,
}

impl FixedPeriod {
    pub fn new(period: Duration) -> FixedPeriod {
        FixedPeriod {
            period,
            last_start: None,
            overruns: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Number of cycles that started late because the previous one took
    /// longer than the period.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Time left in the current period, or `None` if it is already used up.
    pub fn remaining(&self, elapsed: Duration) -> Option<Duration> {
        self.period.checked_sub(elapsed)
    }
}

impl Schedule for FixedPeriod {
    fn wait(&mut self, inputs: &mut SensorInputs) -> Result<(), NodeError> {
        if let Some(start) = self.last_start {
            let elapsed = start.elapsed();
            match self.remaining(elapsed) {
                Some(rest) => thread::sleep(rest),
                None => {
                    self.overruns += 1;
                    warn!(
                        "cycle overran its {:?} period by {:?}",
                        self.period,
                        elapsed - self.period
                    );
                }
            }
        }
        self.last_start = Some(Instant::now());
        inputs.primary_mut().poll()?;
        inputs.poll_secondary();
        Ok(())
    }
}

/// A node that filters sensor samples and publishes a `ResultRecord` per
/// cycle.
pub struct FilteringNode<S>
where
    S: Schedule,
{
    pub inputs: SensorInputs,
    pub sender: NodeSender<ResultRecord>,
    cycle: ProcessingCycle,
    schedule: S,
    epoch: Instant,
    accel_seeded: bool,
    gyro_seeded: bool,
}

impl<S> FilteringNode<S>
where
    S: Schedule,
{
    pub fn new(
        config: &FilterConfig,
        schedule: S,
    ) -> Result<FilteringNode<S>, ConfigError> {
        let cycle = ProcessingCycle::new(config)?;
        let primary = if cycle.has_accel() {
            Channel::Accel
        } else {
            Channel::Gyro
        };
        Ok(FilteringNode {
            inputs: SensorInputs::new(primary),
            sender: vec![],
            cycle,
            schedule,
            epoch: Instant::now(),
            accel_seeded: false,
            gyro_seeded: false,
        })
    }

    pub fn schedule(&self) -> &S {
        &self.schedule
    }

    fn timestamp_us(&self) -> u64 {
        let elapsed = self.epoch.elapsed();
        elapsed.as_secs() * 1_000_000 + u64::from(elapsed.subsec_micros())
    }

    // Cold start: each channel's filters settle on its first real sample.
    fn seed_new_channels(&mut self) {
        if !self.accel_seeded {
            if let Some(sample) = self.inputs.accel.latest() {
                debug!("seeding accel filters from {:?}", sample.xyz);
                self.cycle.reset_available(Some(&sample.xyz), None);
                self.accel_seeded = true;
            }
        }
        if !self.gyro_seeded {
            if let Some(sample) = self.inputs.gyro.latest() {
                debug!("seeding gyro filters from {:?}", sample.xyz);
                self.cycle.reset_available(None, Some(&sample.xyz));
                self.gyro_seeded = true;
            }
        }
    }

    /// Filters the newest samples held by the inputs.
    ///
    /// Returns `None` while the primary channel has not delivered anything.
    pub fn run(&mut self) -> Result<Option<ResultRecord>, NodeError> {
        if self.inputs.primary().latest().is_none() {
            return Ok(None);
        }
        self.seed_new_channels();
        let accel = self.inputs.accel.latest().map(|s| s.xyz);
        let gyro = self.inputs.gyro.latest().map(|s| s.xyz);
        let timestamp_us = self.timestamp_us();
        Ok(Some(self.cycle.step_available(
            timestamp_us,
            accel.as_ref(),
            gyro.as_ref(),
        )))
    }

    /// Re-seeds the filters with the newest samples, for use after the host
    /// signals a sensor discontinuity.
    pub fn reset(&mut self) {
        let accel = self.inputs.accel.latest().map(|s| s.xyz);
        let gyro = self.inputs.gyro.latest().map(|s| s.xyz);
        self.cycle.reset_available(accel.as_ref(), gyro.as_ref());
    }
}

impl<S> Node for FilteringNode<S>
where
    S: Schedule,
{
    fn call(&mut self) -> Result<(), NodeError> {
        if !self.is_connected() {
            return Err(NodeError::PermanentError);
        }
        self.schedule.wait(&mut self.inputs)?;
        let res = match self.run()? {
            Some(res) => res,
            None => {
                trace!("no primary sample yet, skipping cycle");
                return Ok(());
            }
        };
        for send in &self.sender {
            send.send(res).map_err(|_| NodeError::CommError)?;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inputs.primary().is_connected()
    }

    fn start(&mut self) {
        info!(
            "filtering node started, paced by {:?}",
            self.inputs.primary_channel()
        );
        loop {
            if let Err(e) = self.call() {
                warn!("filtering node stopped: {}", e);
                break;
            }
        }
    }
}

/// Constructs a `FilteringNode` that runs once per primary channel sample.
pub fn on_new_data_node(
    config: &FilterConfig,
) -> Result<FilteringNode<OnNewData>, ConfigError> {
    FilteringNode::new(config, OnNewData)
}

/// Constructs a `FilteringNode` that runs at the configured step interval.
pub fn fixed_period_node(
    config: &FilterConfig,
) -> Result<FilteringNode<FixedPeriod>, ConfigError> {
    let period = Duration::from_micros((config.step_interval_s * 1e6) as u64);
    FilteringNode::new(config, FixedPeriod::new(period))
}

#[cfg(test)]
mod test {
    use crate::config::FilterConfig;
    use crate::cycle::cycle_node::*;
    use crate::cycle::{ResultRecord, SampleRecord};
    use crate::prelude::*;
    use assert_approx_eq::assert_approx_eq;
    use std::time::{Duration, Instant};

    #[test]
    fn test_port_keeps_newest() {
        let (send, recv) = channel::unbounded();
        let mut port = InputPort::default();
        assert_eq!(port.poll(), Ok(false));
        port.receiver = Some(recv);

        assert_eq!(port.poll(), Ok(false));
        assert!(port.latest().is_none());
        send.send(SampleRecord::new(1, [1.0; 3])).unwrap();
        send.send(SampleRecord::new(2, [2.0; 3])).unwrap();
        assert_eq!(port.poll(), Ok(true));
        assert_eq!(port.latest().unwrap().timestamp_us, 2);

        // Nothing new: the stale sample is kept.
        assert_eq!(port.poll(), Ok(false));
        assert_eq!(port.latest().unwrap().xyz, [2.0; 3]);

        send.send(SampleRecord::new(3, [3.0; 3])).unwrap();
        drop(send);
        assert_eq!(port.poll(), Ok(true));
        assert_eq!(port.poll(), Err(NodeError::CommError));
        assert_eq!(port.latest().unwrap().timestamp_us, 3);
    }

    #[test]
    fn test_port_wait() {
        let (send, recv) = channel::unbounded();
        let mut port = InputPort::default();
        assert_eq!(port.wait(), Err(NodeError::PermanentError));
        port.receiver = Some(recv);
        send.send(SampleRecord::new(7, [0.5; 3])).unwrap();
        send.send(SampleRecord::new(8, [0.6; 3])).unwrap();
        assert_eq!(port.wait(), Ok(()));
        assert_eq!(port.latest().unwrap().timestamp_us, 7);
        drop(send);
        assert_eq!(port.wait(), Ok(()));
        assert_eq!(port.wait(), Err(NodeError::CommError));
    }

    #[test]
    fn test_primary_selection() {
        let node = on_new_data_node(&FilterConfig::combined()).unwrap();
        assert_eq!(node.inputs.primary_channel(), Channel::Accel);
        let node = on_new_data_node(&FilterConfig::gyro_only()).unwrap();
        assert_eq!(node.inputs.primary_channel(), Channel::Gyro);
        assert!(!node.is_connected());
    }

    #[test]
    fn test_unconnected_node_fails() {
        let mut node = on_new_data_node(&FilterConfig::accel_only()).unwrap();
        assert_eq!(node.call(), Err(NodeError::PermanentError));
    }

    #[test]
    fn test_remaining_clamps_to_none() {
        let schedule = FixedPeriod::new(Duration::from_millis(5));
        assert_eq!(
            schedule.remaining(Duration::from_millis(2)),
            Some(Duration::from_millis(3))
        );
        assert_eq!(schedule.remaining(Duration::from_millis(9)), None);
    }

    #[test]
    fn test_fixed_period_paces_cycles() {
        let mut config = FilterConfig::accel_only();
        config.step_interval_s = 0.005;
        let mut node = fixed_period_node(&config).unwrap();
        assert_eq!(node.schedule().period(), Duration::from_millis(5));

        let (send, recv) = channel::unbounded();
        node.inputs.accel.receiver = Some(recv);
        send.send(SampleRecord::new(0, [0.0, 0.0, 9.81])).unwrap();

        let start = Instant::now();
        for _ in 0..4 {
            node.call().unwrap();
        }
        // Three full periods separate four cycles.
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn test_fixed_period_waits_for_first_sample() {
        let mut config = FilterConfig::accel_only();
        config.step_interval_s = 0.001;
        let mut node = fixed_period_node(&config).unwrap();
        let (send, recv) = channel::unbounded();
        node.inputs.accel.receiver = Some(recv);
        let (out_send, out_recv) = channel::unbounded();
        node.sender.push(out_send);

        for _ in 0..2 {
            node.call().unwrap();
        }
        assert_eq!(out_recv.try_iter().count(), 0);

        // The first published cycle primes on the real sample, so a steady
        // input never shows a derivative.
        send.send(SampleRecord::new(0, [0.0, 0.0, 9.81])).unwrap();
        for _ in 0..20 {
            node.call().unwrap();
        }
        let records: Vec<ResultRecord> = out_recv.try_iter().collect();
        assert_eq!(records.len(), 20);
        assert_eq!(records[0].accel.unwrap().derived, [0.0; 3]);
        for record in records.iter() {
            let accel = record.accel.unwrap();
            assert_approx_eq!(accel.filtered[2], 9.81, 1e-4);
            assert_approx_eq!(accel.derived[2], 0.0, 1e-2);
        }
    }

    #[test]
    fn test_silent_secondary_is_left_out() {
        let mut node = on_new_data_node(&FilterConfig::combined()).unwrap();
        let (accel_send, accel_recv) = channel::unbounded();
        let (_gyro_send, gyro_recv) = channel::unbounded::<SampleRecord>();
        node.inputs.accel.receiver = Some(accel_recv);
        node.inputs.gyro.receiver = Some(gyro_recv);
        let (out_send, out_recv) = channel::unbounded();
        node.sender.push(out_send);

        accel_send.send(SampleRecord::new(0, [0.0, 0.0, 9.81])).unwrap();
        node.call().unwrap();
        let record = out_recv.try_recv().unwrap();
        assert!(record.accel.is_some());
        assert!(record.gyro.is_none());
    }

    #[test]
    fn test_stale_secondary_is_reused() {
        let mut node = on_new_data_node(&FilterConfig::combined()).unwrap();
        let (accel_send, accel_recv) = channel::unbounded();
        let (gyro_send, gyro_recv) = channel::unbounded();
        node.inputs.accel.receiver = Some(accel_recv);
        node.inputs.gyro.receiver = Some(gyro_recv);
        let (out_send, out_recv) = channel::unbounded();
        node.sender.push(out_send);

        gyro_send.send(SampleRecord::new(0, [1.0, 1.0, 1.0])).unwrap();
        drop(gyro_send);
        for n in 0..3 {
            accel_send.send(SampleRecord::new(n, [0.0; 3])).unwrap();
            node.call().unwrap();
        }
        let records: Vec<ResultRecord> = out_recv.try_iter().collect();
        assert_eq!(records.len(), 3);
        // The gyro filter kept seeing the single published sample.
        for record in records.iter() {
            let gyro = record.gyro.unwrap();
            assert_approx_eq!(gyro.filtered[0], 1.0, 1e-5);
            assert_approx_eq!(gyro.derived[0], 0.0, 1e-3);
        }
    }
}
