use serde::Serialize;

/// Gain change of one channel at an absolute time (seconds on the audio clock)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Setpoint {
    pub time: f64,
    pub gain: f32,
}

/// Step-function gain envelope of one channel
///
/// A gain holds from its setpoint until the next one. Before the first
/// setpoint the channel is silent. Setpoints are kept in non-decreasing time
/// order; when two share a time the later one wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChannelTimeline {
    setpoints: Vec<Setpoint>,
}

impl ChannelTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a setpoint; it must not precede the last one
    pub(crate) fn set(&mut self, time: f64, gain: f32) {
        debug_assert!(
            self.setpoints.last().map_or(true, |last| last.time <= time),
            "setpoint at {} precedes previous setpoint",
            time
        );
        self.setpoints.push(Setpoint { time, gain });
    }

    pub fn setpoints(&self) -> &[Setpoint] {
        &self.setpoints
    }

    pub fn is_empty(&self) -> bool {
        self.setpoints.is_empty()
    }

    pub fn gain_at(&self, time: f64) -> f32 {
        let idx = self.setpoints.partition_point(|s| s.time <= time);
        if idx == 0 {
            0.0
        } else {
            self.setpoints[idx - 1].gain
        }
    }
}

/// Per-channel gain schedule produced by [`crate::Encoder::encode`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodeTimeline {
    start_time: f64,
    stop_time: f64,
    channels: Vec<ChannelTimeline>,
}

impl EncodeTimeline {
    pub(crate) fn new(channel_count: usize, start_time: f64, stop_time: f64) -> Self {
        Self {
            start_time,
            stop_time,
            channels: vec![ChannelTimeline::new(); channel_count],
        }
    }

    pub(crate) fn channel_mut(&mut self, index: usize) -> &mut ChannelTimeline {
        &mut self.channels[index]
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// Time at which every channel is silenced
    pub fn stop_time(&self) -> f64 {
        self.stop_time
    }

    pub fn duration(&self) -> f64 {
        self.stop_time - self.start_time
    }

    pub fn channels(&self) -> &[ChannelTimeline] {
        &self.channels
    }

    pub fn channel(&self, index: usize) -> Option<&ChannelTimeline> {
        self.channels.get(index)
    }

    /// Gain of every channel at `time`
    pub fn gains_at(&self, time: f64) -> Vec<f32> {
        self.channels.iter().map(|c| c.gain_at(time)).collect()
    }

    pub fn setpoint_count(&self) -> usize {
        self.channels.iter().map(|c| c.setpoints.len()).sum()
    }
}
