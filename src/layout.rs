use std::ops::Range;

/// Display class of a channel index.
///
/// The viewer distinguishes channels only by their position relative to the
/// amplifier/digital boundary; the class carries the color and gain
/// conventions for each side of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelClass {
    /// Continuous electrophysiology channel
    Amplifier,
    /// Binary auxiliary input channel
    Digital,
}

impl ChannelClass {
    /// Returns the trace color for this class as a `#rrggbb` string.
    pub fn color(self) -> &'static str {
        match self {
            ChannelClass::Amplifier => "#0080ff",
            ChannelClass::Digital => "#87ff00",
        }
    }

    /// Returns the default display gain for this class.
    ///
    /// A gain of zero flattens digital traces to their baseline until the
    /// user scales them up; it is a viewer convention, not a measurement.
    pub fn display_gain(self) -> i32 {
        match self {
            ChannelClass::Amplifier => -20,
            ChannelClass::Digital => 0,
        }
    }
}

/// Channel ordering shared by every artifact of one conversion.
///
/// The sample file and both metadata documents must agree on the total
/// channel count and on where the amplifier block ends. The layout is
/// derived once per conversion from the descriptor's channel lists and
/// handed to each consumer, so the boundary cannot drift between files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelLayout {
    num_amplifier: usize,
    num_digital: usize,
}

impl ChannelLayout {
    /// Creates the layout for `num_amplifier` amplifier channels followed
    /// by `num_digital` digital input channels.
    pub fn new(num_amplifier: usize, num_digital: usize) -> ChannelLayout {
        ChannelLayout {
            num_amplifier,
            num_digital,
        }
    }

    /// Returns the number of amplifier channels.
    pub fn num_amplifier(&self) -> usize {
        self.num_amplifier
    }

    /// Returns the number of digital input channels.
    pub fn num_digital(&self) -> usize {
        self.num_digital
    }

    /// Returns the total channel count.
    pub fn total_channels(&self) -> usize {
        self.num_amplifier + self.num_digital
    }

    /// Returns the class of a flat channel index: amplifier below the
    /// boundary, digital at or above it.
    pub fn class_of(&self, index: usize) -> ChannelClass {
        if index < self.num_amplifier {
            ChannelClass::Amplifier
        } else {
            ChannelClass::Digital
        }
    }

    /// Returns the anatomical groups as flat index ranges, amplifier block
    /// first. Empty blocks yield no group at all, so a recording without
    /// digital inputs produces exactly one group.
    pub fn groups(&self) -> Vec<Range<usize>> {
        let mut groups = Vec::with_capacity(2);
        if self.num_amplifier > 0 {
            groups.push(0..self.num_amplifier);
        }
        if self.num_digital > 0 {
            groups.push(self.num_amplifier..self.total_channels());
        }
        groups
    }
}
