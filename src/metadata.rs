use std::fmt::Display;
use std::io;
use std::path::Path;

use xmltree::{Element, EmitterConfig, XMLNode};

use crate::layout::ChannelLayout;
use crate::types::{ConvertError, RecordingDescriptor, ViewerDefaults};

// Constants fixed by the Neuroscope document schemas.
const PARAMETERS_VERSION: &str = "1.0";
const CREATOR: &str = "rhd2ns";
const NEUROSCOPE_VERSION: &str = "2.0.0";
const POSITION_FILE_TYPE: &str = "3";
const POSITION_FILE_EXTENSION: &str = "pos";
const SCREEN_GAIN: &str = "2.0";
const SPIKE_WAVEFORM_SAMPLES: u32 = 32;
const SPIKE_PEAK_SAMPLE_INDEX: u32 = 16;

/// Builds the parameter document written next to the sample file as
/// `{stem}.xml`.
///
/// The tree describes the acquisition system (bit depth, channel count,
/// sample rate), the anatomical channel groups and the per-channel display
/// colors. It is a pure function of its arguments; nothing here touches
/// the filesystem or the clock. Fails only when the sample element type
/// has no bit depth, which the multiplexer normally rejects first.
pub fn build_parameter_document(
    descriptor: &RecordingDescriptor,
    layout: &ChannelLayout,
    defaults: &ViewerDefaults,
) -> Result<Element, ConvertError> {
    let bit_depth = descriptor.amplifier_data.bit_depth()?;

    let mut parameters = elem("parameters");
    set_attr(&mut parameters, "version", PARAMETERS_VERSION);
    set_attr(&mut parameters, "creator", CREATOR);

    // Position file the viewer may find next to the samples
    let mut file = elem("file");
    push(&mut file, leaf("extension", POSITION_FILE_EXTENSION));
    push(&mut file, leaf("samplingRate", defaults.position_sample_rate));
    let mut files = elem("files");
    push(&mut files, file);
    push(&mut parameters, files);

    let mut video = elem("video");
    push(&mut video, leaf("width", defaults.video_width));
    push(&mut video, leaf("height", defaults.video_height));
    push(&mut video, leaf("positionsBackground", 1));
    push(&mut parameters, video);

    let mut acquisition = elem("acquisitionSystem");
    push(&mut acquisition, leaf("nBits", bit_depth));
    push(&mut acquisition, leaf("nChannels", layout.total_channels()));
    push(&mut acquisition, leaf("samplingRate", descriptor.amplifier_sample_rate));
    push(&mut acquisition, leaf("voltageRange", defaults.voltage_range));
    push(&mut acquisition, leaf("amplification", defaults.amplification));
    push(&mut acquisition, leaf("offset", defaults.offset));
    push(&mut parameters, acquisition);

    let mut field_potentials = elem("fieldPotentials");
    push(&mut field_potentials, leaf("lfpSamplingRate", defaults.lfp_sample_rate));
    push(&mut parameters, field_potentials);

    push(&mut parameters, anatomical_description(layout));
    push(&mut parameters, elem("spikeDetection"));
    push(&mut parameters, neuroscope_display(layout));

    Ok(parameters)
}

/// Builds the display-settings document written next to the sample file as
/// `{stem}.nrs`.
///
/// `position_file` names an existing `.pos` artifact; when it is `None`
/// the files block is left out entirely rather than emitted empty, so the
/// viewer never chases a reference to a file that was not produced.
pub fn build_settings_document(
    layout: &ChannelLayout,
    position_file: Option<&Path>,
    defaults: &ViewerDefaults,
) -> Element {
    let mut settings = elem("neuroscope");
    set_attr(&mut settings, "version", NEUROSCOPE_VERSION);

    if let Some(position_file) = position_file {
        let mut file = elem("file");
        push(&mut file, leaf("type", POSITION_FILE_TYPE));
        push(&mut file, leaf("url", position_file.display()));
        let mut files = elem("files");
        push(&mut files, file);
        push(&mut settings, files);
    }

    let mut display = elem("display");
    push(&mut display, leaf("startTime", 0));
    push(&mut display, leaf("duration", defaults.display_duration));

    let mut positions = elem("channelPositions");
    for index in 0..layout.total_channels() {
        let mut position = elem("channelPosition");
        push(&mut position, leaf("channel", index));
        push(&mut position, leaf("gain", layout.class_of(index).display_gain()));
        push(&mut positions, position);
    }
    push(&mut display, positions);

    let mut displays = elem("displays");
    push(&mut displays, display);
    push(&mut settings, displays);

    settings
}

/// Serializes a document tree to the bytes both sidecar files share: an
/// XML declaration followed by the tree on one line, with empty tags kept
/// expanded and truly empty.
///
/// Serialization is separate from writing so callers can diff or inspect
/// a document without touching disk. The byte output is deterministic for
/// a given tree.
pub fn document_to_bytes(document: &Element) -> Result<Vec<u8>, ConvertError> {
    // No indentation: the emitter would move the end tag of a childless
    // element onto its own line, and the viewer reads the image elements'
    // content as literal paths.
    let config = EmitterConfig::new().normalize_empty_elements(false);
    let mut buf = Vec::new();
    document
        .write_with_config(&mut buf, config)
        .map_err(io::Error::other)?;
    Ok(buf)
}

/// Helper function to build the anatomical description block: one group of
/// amplifier channels, then one of digital channels, empty groups omitted.
fn anatomical_description(layout: &ChannelLayout) -> Element {
    let mut channel_group = elem("channelGroup");
    for group in layout.groups() {
        let mut group_el = elem("group");
        for index in group {
            let mut channel = elem("channel");
            set_attr(&mut channel, "skip", "0");
            channel.children.push(XMLNode::Text(index.to_string()));
            push(&mut group_el, channel);
        }
        push(&mut channel_group, group_el);
    }
    let mut anatomical = elem("anatomicalDescription");
    push(&mut anatomical, channel_group);
    anatomical
}

/// Helper function to build the viewer's embedded display block with
/// per-channel colors and offsets.
fn neuroscope_display(layout: &ChannelLayout) -> Element {
    let mut neuroscope = elem("neuroscope");
    set_attr(&mut neuroscope, "version", NEUROSCOPE_VERSION);

    let mut misc = elem("miscellaneous");
    push(&mut misc, leaf("screenGain", SCREEN_GAIN));
    push(&mut misc, empty_leaf("traceBackgroundImage"));
    push(&mut neuroscope, misc);

    let mut video = elem("video");
    push(&mut video, leaf("rotate", 0));
    push(&mut video, leaf("flip", 0));
    push(&mut video, empty_leaf("videoImage"));
    push(&mut video, leaf("positionsBackground", 0));
    push(&mut neuroscope, video);

    let mut spikes = elem("spikes");
    push(&mut spikes, leaf("nSamples", SPIKE_WAVEFORM_SAMPLES));
    push(&mut spikes, leaf("peakSampleIndex", SPIKE_PEAK_SAMPLE_INDEX));
    push(&mut neuroscope, spikes);

    let mut channels = elem("channels");
    for index in 0..layout.total_channels() {
        let color = layout.class_of(index).color();
        let mut channel_colors = elem("channelColors");
        push(&mut channel_colors, leaf("channel", index));
        push(&mut channel_colors, leaf("color", color));
        push(&mut channel_colors, leaf("anatomyColor", color));
        push(&mut channel_colors, leaf("spikeColor", color));
        push(&mut channels, channel_colors);

        let mut channel_offset = elem("channelOffset");
        push(&mut channel_offset, leaf("channel", index));
        push(&mut channel_offset, leaf("defaultOffset", 0));
        push(&mut channels, channel_offset);
    }
    push(&mut neuroscope, channels);

    neuroscope
}

fn elem(name: &str) -> Element {
    Element::new(name)
}

fn set_attr(el: &mut Element, name: &str, value: &str) {
    el.attributes.insert(name.to_string(), value.to_string());
}

fn push(parent: &mut Element, child: Element) {
    parent.children.push(XMLNode::Element(child));
}

/// Helper function to build an element holding a single text value.
fn leaf(name: &str, value: impl Display) -> Element {
    let mut el = Element::new(name);
    el.children.push(XMLNode::Text(value.to_string()));
    el
}

fn empty_leaf(name: &str) -> Element {
    Element::new(name)
}

#[cfg(test)]
mod test {
    use ndarray::Array2;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::types::SampleMatrix;

    fn descriptor(a: usize, d: usize, rate: f64, data: SampleMatrix) -> RecordingDescriptor {
        RecordingDescriptor {
            amplifier_channels: (0..a).map(|i| format!("A-{:03}", i)).collect(),
            board_dig_in_channels: (0..d).map(|i| format!("DIN-{:02}", i)).collect(),
            amplifier_sample_rate: rate,
            amplifier_data: data,
            board_dig_in_data: None,
        }
    }

    fn int16_descriptor(a: usize, d: usize, rate: f64) -> RecordingDescriptor {
        descriptor(a, d, rate, SampleMatrix::Int16(Array2::zeros((a, 4))))
    }

    fn text(el: &Element, name: &str) -> String {
        el.get_child(name)
            .unwrap_or_else(|| panic!("missing <{}>", name))
            .get_text()
            .unwrap_or_default()
            .into_owned()
    }

    fn child_elements<'a>(el: &'a Element, name: &str) -> Vec<&'a Element> {
        el.get_child(name)
            .unwrap_or_else(|| panic!("missing <{}>", name))
            .children
            .iter()
            .filter_map(|node| node.as_element())
            .collect()
    }

    #[test]
    fn acquisition_block_reflects_the_recording() {
        let desc = int16_descriptor(2, 0, 20000.0);
        let doc =
            build_parameter_document(&desc, &desc.layout(), &ViewerDefaults::default()).unwrap();

        assert_eq!(doc.name, "parameters");
        assert_eq!(doc.attributes.get("version").map(String::as_str), Some("1.0"));
        assert_eq!(doc.attributes.get("creator").map(String::as_str), Some("rhd2ns"));

        let acquisition = doc.get_child("acquisitionSystem").unwrap();
        assert_eq!(text(acquisition, "nBits"), "16");
        assert_eq!(text(acquisition, "nChannels"), "2");
        assert_eq!(text(acquisition, "samplingRate"), "20000");
        assert_eq!(text(acquisition, "voltageRange"), "20");
        assert_eq!(text(acquisition, "amplification"), "1000");
        assert_eq!(text(acquisition, "offset"), "0");

        let lfp = doc.get_child("fieldPotentials").unwrap();
        assert_eq!(text(lfp, "lfpSamplingRate"), "1250");
    }

    #[test]
    fn bit_depth_follows_the_element_type() {
        let defaults = ViewerDefaults::default();

        let desc = descriptor(1, 0, 20000.0, SampleMatrix::Int32(Array2::zeros((1, 4))));
        let doc = build_parameter_document(&desc, &desc.layout(), &defaults).unwrap();
        assert_eq!(text(doc.get_child("acquisitionSystem").unwrap(), "nBits"), "32");

        let desc = descriptor(1, 0, 20000.0, SampleMatrix::Int64(Array2::zeros((1, 4))));
        let doc = build_parameter_document(&desc, &desc.layout(), &defaults).unwrap();
        assert_eq!(text(doc.get_child("acquisitionSystem").unwrap(), "nBits"), "64");

        let desc = descriptor(1, 0, 20000.0, SampleMatrix::Float32(Array2::zeros((1, 4))));
        let err = build_parameter_document(&desc, &desc.layout(), &defaults).unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedFormat { dtype: "float32" }));
    }

    #[test]
    fn fractional_sample_rates_keep_their_fraction() {
        let desc = int16_descriptor(1, 0, 2500.5);
        let doc =
            build_parameter_document(&desc, &desc.layout(), &ViewerDefaults::default()).unwrap();
        assert_eq!(text(doc.get_child("acquisitionSystem").unwrap(), "samplingRate"), "2500.5");
    }

    #[test]
    fn anatomical_groups_follow_the_layout() {
        let desc = int16_descriptor(3, 2, 20000.0);
        let layout = ChannelLayout::new(3, 2);
        let doc = build_parameter_document(&desc, &layout, &ViewerDefaults::default()).unwrap();

        let channel_group = doc
            .get_child("anatomicalDescription")
            .unwrap()
            .get_child("channelGroup")
            .unwrap();
        let groups: Vec<&Element> = channel_group
            .children
            .iter()
            .filter_map(|node| node.as_element())
            .collect();
        assert_eq!(groups.len(), 2);

        let indices = |group: &Element| -> Vec<String> {
            group
                .children
                .iter()
                .filter_map(|node| node.as_element())
                .map(|ch| ch.get_text().unwrap_or_default().into_owned())
                .collect()
        };
        assert_eq!(indices(groups[0]), ["0", "1", "2"]);
        assert_eq!(indices(groups[1]), ["3", "4"]);
        for group in groups {
            for channel in group.children.iter().filter_map(|node| node.as_element()) {
                assert_eq!(channel.attributes.get("skip").map(String::as_str), Some("0"));
            }
        }
    }

    #[test]
    fn amplifier_only_layout_has_exactly_one_group() {
        let desc = int16_descriptor(2, 0, 20000.0);
        let doc =
            build_parameter_document(&desc, &desc.layout(), &ViewerDefaults::default()).unwrap();

        let channel_group = doc
            .get_child("anatomicalDescription")
            .unwrap()
            .get_child("channelGroup")
            .unwrap();
        let groups: Vec<&Element> = channel_group
            .children
            .iter()
            .filter_map(|node| node.as_element())
            .collect();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].children.iter().filter_map(|n| n.as_element()).count(), 2);
    }

    #[test]
    fn channel_colors_split_at_the_boundary() {
        let desc = int16_descriptor(3, 2, 20000.0);
        let doc =
            build_parameter_document(&desc, &desc.layout(), &ViewerDefaults::default()).unwrap();

        let neuroscope = doc.get_child("neuroscope").unwrap();
        let colors: Vec<&Element> = neuroscope
            .get_child("channels")
            .unwrap()
            .children
            .iter()
            .filter_map(|node| node.as_element())
            .filter(|el| el.name == "channelColors")
            .collect();
        assert_eq!(colors.len(), 5);
        for el in &colors {
            let index: usize = text(el, "channel").parse().unwrap();
            let expected = if index < 3 { "#0080ff" } else { "#87ff00" };
            assert_eq!(text(el, "color"), expected);
            assert_eq!(text(el, "anatomyColor"), expected);
            assert_eq!(text(el, "spikeColor"), expected);
        }

        let offsets: Vec<&Element> = neuroscope
            .get_child("channels")
            .unwrap()
            .children
            .iter()
            .filter_map(|node| node.as_element())
            .filter(|el| el.name == "channelOffset")
            .collect();
        assert_eq!(offsets.len(), 5);
        for el in offsets {
            assert_eq!(text(el, "defaultOffset"), "0");
        }
    }

    #[test]
    fn file_video_and_spike_blocks_carry_their_fixed_values() {
        let desc = int16_descriptor(1, 0, 20000.0);
        let doc =
            build_parameter_document(&desc, &desc.layout(), &ViewerDefaults::default()).unwrap();

        let file = doc.get_child("files").unwrap().get_child("file").unwrap();
        assert_eq!(text(file, "extension"), "pos");
        assert_eq!(text(file, "samplingRate"), "20");

        let video = doc.get_child("video").unwrap();
        assert_eq!(text(video, "width"), "1280");
        assert_eq!(text(video, "height"), "1024");
        assert_eq!(text(video, "positionsBackground"), "1");

        let neuroscope = doc.get_child("neuroscope").unwrap();
        let misc = neuroscope.get_child("miscellaneous").unwrap();
        assert_eq!(text(misc, "screenGain"), "2.0");
        assert_eq!(text(misc, "traceBackgroundImage"), "");

        let embedded_video = neuroscope.get_child("video").unwrap();
        assert_eq!(text(embedded_video, "rotate"), "0");
        assert_eq!(text(embedded_video, "flip"), "0");
        assert_eq!(text(embedded_video, "videoImage"), "");
        assert_eq!(text(embedded_video, "positionsBackground"), "0");

        let spikes = neuroscope.get_child("spikes").unwrap();
        assert_eq!(text(spikes, "nSamples"), "32");
        assert_eq!(text(spikes, "peakSampleIndex"), "16");
    }

    #[test]
    fn settings_gains_follow_the_channel_class() {
        let layout = ChannelLayout::new(2, 2);
        let doc = build_settings_document(&layout, None, &ViewerDefaults::default());

        assert_eq!(doc.name, "neuroscope");
        assert_eq!(doc.attributes.get("version").map(String::as_str), Some("2.0.0"));
        assert!(doc.get_child("files").is_none());

        let display = doc.get_child("displays").unwrap().get_child("display").unwrap();
        assert_eq!(text(display, "startTime"), "0");
        assert_eq!(text(display, "duration"), "1000");

        let positions = child_elements(display, "channelPositions");
        assert_eq!(positions.len(), 4);
        for el in positions {
            let index: usize = text(el, "channel").parse().unwrap();
            let expected = if index < 2 { "-20" } else { "0" };
            assert_eq!(text(el, "gain"), expected);
        }
    }

    #[test]
    fn settings_reference_the_position_file_only_when_given() {
        let layout = ChannelLayout::new(1, 0);
        let doc = build_settings_document(
            &layout,
            Some(Path::new("/data/session/positions.pos")),
            &ViewerDefaults::default(),
        );

        let file = doc.get_child("files").unwrap().get_child("file").unwrap();
        assert_eq!(text(file, "type"), "3");
        assert_eq!(text(file, "url"), "/data/session/positions.pos");
    }

    #[test]
    fn serialized_documents_parse_back_and_are_deterministic() {
        let desc = int16_descriptor(2, 1, 20000.0);
        let doc =
            build_parameter_document(&desc, &desc.layout(), &ViewerDefaults::default()).unwrap();

        let first = document_to_bytes(&doc).unwrap();
        let second = document_to_bytes(&doc).unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with(b"<?xml"));

        let reparsed = Element::parse(first.as_slice()).unwrap();
        assert_eq!(reparsed.name, "parameters");
        assert_eq!(
            text(reparsed.get_child("acquisitionSystem").unwrap(), "nChannels"),
            "3"
        );
    }

    #[test]
    fn empty_elements_are_written_expanded_with_nothing_inside() {
        let desc = int16_descriptor(1, 0, 20000.0);
        let doc =
            build_parameter_document(&desc, &desc.layout(), &ViewerDefaults::default()).unwrap();
        let bytes = document_to_bytes(&doc).unwrap();
        let rendered = String::from_utf8(bytes).unwrap();

        // Whitespace between these tags would read back as element content,
        // and the image elements' content is taken as a path.
        assert!(rendered.contains("<spikeDetection></spikeDetection>"));
        assert!(rendered.contains("<traceBackgroundImage></traceBackgroundImage>"));
        assert!(rendered.contains("<videoImage></videoImage>"));
        assert!(!rendered.contains("<spikeDetection />"));

        let reparsed = Element::parse(rendered.as_bytes()).unwrap();
        let misc = reparsed
            .get_child("neuroscope")
            .unwrap()
            .get_child("miscellaneous")
            .unwrap();
        assert_eq!(misc.get_child("traceBackgroundImage").unwrap().get_text(), None);
    }
}
