#[macro_use]
extern crate imu_filter_rs;

use imu_filter_rs::config::FilterConfig;
use imu_filter_rs::cycle::cycle_node::{fixed_period_node, on_new_data_node};
use imu_filter_rs::cycle::{ResultRecord, SampleRecord};
use imu_filter_rs::prelude::*;
use rand::distributions::Normal;
use rand::{thread_rng, Rng};
use std::env;
use std::f64::consts::PI;
use std::fs;
use std::time::Duration;

/// Simulates a sensor: a constant offset plus a sinusoid plus white noise on
/// every axis, published at the configured rate.
struct SensorSim {
    offset: [f64; 3],
    amplitude: f64,
    freq_hz: f64,
    noise: Normal,
    step_s: f64,
    remaining: u64,
    n: u64,
    sender: NodeSender<SampleRecord>,
}

impl SensorSim {
    fn new(offset: [f64; 3], amplitude: f64, freq_hz: f64, step_s: f64, count: u64) -> Self {
        SensorSim {
            offset,
            amplitude,
            freq_hz,
            noise: Normal::new(0.0, 0.05),
            step_s,
            remaining: count,
            n: 0,
            sender: vec![],
        }
    }
}

impl Node for SensorSim {
    fn call(&mut self) -> Result<(), NodeError> {
        if self.remaining == 0 {
            return Err(NodeError::PermanentError);
        }
        self.remaining -= 1;
        let t = self.n as f64 * self.step_s;
        let wave = self.amplitude * (2.0 * PI * self.freq_hz * t).sin();
        let mut rng = thread_rng();
        let mut xyz = [0.0f32; 3];
        for (v, offset) in xyz.iter_mut().zip(self.offset.iter()) {
            *v = (offset + wave + rng.sample(self.noise)) as f32;
        }
        let sample = SampleRecord::new((t * 1e6) as u64, xyz);
        self.n += 1;
        for send in &self.sender {
            send.send(sample).map_err(|_| NodeError::CommError)?;
        }
        thread::sleep(Duration::from_micros((self.step_s * 1e6) as u64));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.sender.is_empty()
    }
}

fn print_record(record: &ResultRecord) {
    if let Some(accel) = record.accel {
        println!(
            "{:>10} us  accel {:>8.3?}  jerk {:>8.3?}",
            record.timestamp_us, accel.filtered, accel.derived
        );
    }
    if let Some(gyro) = record.gyro {
        println!(
            "{:>10} us  gyro  {:>8.3?}  ang acc {:>8.3?}",
            record.timestamp_us, gyro.filtered, gyro.derived
        );
    }
}

/// Usage: imu_pipeline [--fixed-period] [config.cbor]
fn main() {
    env_logger::init();

    let mut fixed = false;
    let mut config = FilterConfig::combined();
    for arg in env::args().skip(1) {
        if arg == "--fixed-period" {
            fixed = true;
            continue;
        }
        let bytes = fs::read(&arg).expect("could not read config file");
        config = FilterConfig::from_cbor(&bytes).expect("invalid config");
    }

    let step = config.step_interval_s;
    let mut accel = SensorSim::new([0.0, 0.0, 9.81], 0.5, 3.0, step, 800);
    let mut gyro = SensorSim::new([0.0, 0.0, 0.0], 0.2, 1.0, step, 800);
    let (out_send, out_recv) = channel::unbounded::<ResultRecord>();

    let mut handles = if fixed {
        let mut node = fixed_period_node(&config).expect("invalid config");
        connect_nodes!(accel, sender, node, inputs.accel.receiver);
        connect_nodes!(gyro, sender, node, inputs.gyro.receiver);
        node.sender.push(out_send);
        start_nodes!(node)
    } else {
        let mut node = on_new_data_node(&config).expect("invalid config");
        connect_nodes!(accel, sender, node, inputs.accel.receiver);
        connect_nodes!(gyro, sender, node, inputs.gyro.receiver);
        node.sender.push(out_send);
        start_nodes!(node)
    };
    handles.extend(start_nodes!(accel, gyro));

    for (ix, record) in out_recv.iter().enumerate() {
        if ix % 40 == 0 {
            print_record(&record);
        }
    }
    for handle in handles {
        handle.join().expect("node thread panicked");
    }
}
