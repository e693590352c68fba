//! H.264 Annex-B byte stream handling: start-code scanning, access-unit
//! grouping, and conversion to length-prefixed samples.

pub const NAL_SLICE: u8 = 1;
pub const NAL_IDR_SLICE: u8 = 5;
pub const NAL_SEI: u8 = 6;
pub const NAL_SPS: u8 = 7;
pub const NAL_PPS: u8 = 8;
pub const NAL_AUD: u8 = 9;

const START_CODE: [u8; 4] = [0, 0, 0, 1];

pub fn nal_type(nal: &[u8]) -> u8 {
    nal.first().map_or(0, |b| b & 0x1f)
}

fn is_vcl(kind: u8) -> bool {
    kind == NAL_SLICE || kind == NAL_IDR_SLICE
}

/// True when a slice NAL starts a new picture (`first_mb_in_slice == 0`,
/// whose Exp-Golomb code is a single set bit).
fn starts_picture(nal: &[u8]) -> bool {
    nal.get(1).is_some_and(|b| b & 0x80 != 0)
}

/// Position and length of the next start code at or after `from`.
fn find_start_code(data: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut i = from;
    while i + 3 <= data.len() {
        if data[i] == 0 && data[i + 1] == 0 {
            if data[i + 2] == 1 {
                return Some((i, 3));
            }
            if data[i + 2] == 0 && data.get(i + 3) == Some(&1) {
                return Some((i, 4));
            }
        }
        i += 1;
    }
    None
}

fn trim_trailing_zeros(nal: &[u8]) -> &[u8] {
    let end = nal.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
    &nal[..end]
}

/// Split a complete Annex-B buffer into NAL unit payloads.
pub fn split_nal_units(data: &[u8]) -> Vec<&[u8]> {
    let mut units = Vec::new();
    let Some((mut pos, mut len)) = find_start_code(data, 0) else {
        return units;
    };
    loop {
        let body = pos + len;
        match find_start_code(data, body) {
            Some((next, next_len)) => {
                let nal = trim_trailing_zeros(&data[body..next]);
                if !nal.is_empty() {
                    units.push(nal);
                }
                pos = next;
                len = next_len;
            }
            None => {
                let nal = trim_trailing_zeros(&data[body..]);
                if !nal.is_empty() {
                    units.push(nal);
                }
                return units;
            }
        }
    }
}

/// Re-encode NAL units with 4-byte start codes.
pub fn join_annexb<'a>(nals: impl IntoIterator<Item = &'a [u8]>) -> Vec<u8> {
    let mut out = Vec::new();
    for nal in nals {
        out.extend_from_slice(&START_CODE);
        out.extend_from_slice(nal);
    }
    out
}

/// Convert an Annex-B access unit to 4-byte length-prefixed NAL units,
/// dropping parameter sets and delimiters that live in the sample
/// description instead.
pub fn annexb_to_length_prefixed(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 16);
    for nal in split_nal_units(data) {
        if matches!(nal_type(nal), NAL_SPS | NAL_PPS | NAL_AUD) {
            continue;
        }
        out.extend_from_slice(&(nal.len() as u32).to_be_bytes());
        out.extend_from_slice(nal);
    }
    out
}

/// SPS and PPS payloads found in an Annex-B buffer.
pub fn parameter_sets(data: &[u8]) -> (Vec<&[u8]>, Vec<&[u8]>) {
    let nals = split_nal_units(data);
    let sps = nals.iter().copied().filter(|n| nal_type(n) == NAL_SPS).collect();
    let pps = nals.iter().copied().filter(|n| nal_type(n) == NAL_PPS).collect();
    (sps, pps)
}

/// Output of [`AccessUnitSplitter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUnit {
    /// New SPS/PPS, Annex-B encoded.
    Config(Vec<u8>),
    /// One coded picture, Annex-B encoded.
    Picture { data: Vec<u8>, keyframe: bool },
}

/// Incrementally groups an Annex-B stream, fed in arbitrary chunks, into
/// parameter-set updates and whole pictures.
#[derive(Debug, Default)]
pub struct AccessUnitSplitter {
    pending: Vec<u8>,
    params: Vec<Vec<u8>>,
    params_dirty: bool,
    current: Vec<Vec<u8>>,
    current_has_vcl: bool,
    ready: Vec<StreamUnit>,
}

impl AccessUnitSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed more bytes. Returns the units completed by them.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamUnit> {
        self.pending.extend_from_slice(chunk);

        // Only NAL units followed by another start code are complete.
        let mut complete = Vec::new();
        let mut consumed = 0;
        if let Some((mut pos, mut len)) = find_start_code(&self.pending, 0) {
            while let Some((next, next_len)) = find_start_code(&self.pending, pos + len) {
                let nal = trim_trailing_zeros(&self.pending[pos + len..next]);
                if !nal.is_empty() {
                    complete.push(nal.to_vec());
                }
                consumed = next;
                pos = next;
                len = next_len;
            }
        }
        self.pending.drain(..consumed);

        for nal in complete {
            self.accept(nal);
        }
        std::mem::take(&mut self.ready)
    }

    /// End of stream: flush the last NAL unit and picture.
    pub fn finish(&mut self) -> Vec<StreamUnit> {
        let rest = std::mem::take(&mut self.pending);
        let nals: Vec<Vec<u8>> = split_nal_units(&rest).into_iter().map(<[u8]>::to_vec).collect();
        for nal in nals {
            self.accept(nal);
        }
        self.flush_picture();
        std::mem::take(&mut self.ready)
    }

    fn accept(&mut self, nal: Vec<u8>) {
        let kind = nal_type(&nal);
        match kind {
            NAL_SPS | NAL_PPS => {
                self.flush_picture();
                if self.params_dirty {
                    // Another set in the same run; replace by type.
                    self.params.retain(|p| nal_type(p) != kind);
                } else {
                    self.params.clear();
                    self.params_dirty = true;
                }
                self.params.push(nal);
            }
            NAL_SEI | NAL_AUD => {
                self.flush_picture();
                self.emit_params();
                self.current.push(nal);
            }
            k if is_vcl(k) => {
                if self.current_has_vcl && starts_picture(&nal) {
                    self.flush_picture();
                }
                self.emit_params();
                self.current.push(nal);
                self.current_has_vcl = true;
            }
            _ => self.current.push(nal),
        }
    }

    fn emit_params(&mut self) {
        if self.params_dirty {
            self.params_dirty = false;
            self.ready.push(StreamUnit::Config(join_annexb(
                self.params.iter().map(Vec::as_slice),
            )));
        }
    }

    /// Close the current picture if it has any slice data.
    fn flush_picture(&mut self) {
        if !self.current_has_vcl {
            return;
        }
        let keyframe = self.current.iter().any(|n| nal_type(n) == NAL_IDR_SLICE);
        let data = join_annexb(self.current.iter().map(Vec::as_slice));
        self.current.clear();
        self.current_has_vcl = false;
        self.ready.push(StreamUnit::Picture { data, keyframe });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPS: &[u8] = &[0x67, 0x4d, 0x00, 0x1f, 0xaa];
    const PPS: &[u8] = &[0x68, 0xee, 0x3c, 0x80];
    const SEI: &[u8] = &[0x06, 0x05, 0x01, 0x80];
    const IDR: &[u8] = &[0x65, 0x88, 0x84, 0x21];
    const P1: &[u8] = &[0x41, 0x9a, 0x02, 0x03];
    const P2: &[u8] = &[0x41, 0x9b, 0x04, 0x05];
    // Second slice of the same picture: first_mb_in_slice != 0.
    const P2_SLICE2: &[u8] = &[0x41, 0x40, 0x06];

    fn stream() -> Vec<u8> {
        let mut s = join_annexb([SPS, PPS, SEI, IDR, P1]);
        // A 3-byte start code in the middle.
        s.extend_from_slice(&[0, 0, 1]);
        s.extend_from_slice(P2);
        s.extend_from_slice(&join_annexb([P2_SLICE2]));
        s
    }

    #[test]
    fn test_split_nal_units_handles_both_start_codes() {
        let data = stream();
        let nals = split_nal_units(&data);
        assert_eq!(nals, vec![SPS, PPS, SEI, IDR, P1, P2, P2_SLICE2]);
    }

    #[test]
    fn test_length_prefixed_drops_parameter_sets() {
        let au = join_annexb([SPS, PPS, IDR]);
        let out = annexb_to_length_prefixed(&au);
        assert_eq!(&out[..4], &[0, 0, 0, 4]);
        assert_eq!(&out[4..], IDR);
    }

    #[test]
    fn test_parameter_sets() {
        let data = stream();
        let (sps, pps) = parameter_sets(&data);
        assert_eq!(sps, vec![SPS]);
        assert_eq!(pps, vec![PPS]);
    }

    #[test]
    fn test_splitter_groups_pictures_across_chunks() {
        let data = stream();
        let mut splitter = AccessUnitSplitter::new();
        let mut units = Vec::new();
        // Feed in awkward 3-byte chunks.
        for chunk in data.chunks(3) {
            units.extend(splitter.push(chunk));
        }
        units.extend(splitter.finish());

        assert_eq!(units.len(), 4);
        assert_eq!(units[0], StreamUnit::Config(join_annexb([SPS, PPS])));
        assert_eq!(
            units[1],
            StreamUnit::Picture {
                data: join_annexb([SEI, IDR]),
                keyframe: true
            }
        );
        assert_eq!(
            units[2],
            StreamUnit::Picture {
                data: join_annexb([P1]),
                keyframe: false
            }
        );
        assert_eq!(
            units[3],
            StreamUnit::Picture {
                data: join_annexb([P2, P2_SLICE2]),
                keyframe: false
            }
        );
    }

    #[test]
    fn test_splitter_holds_incomplete_tail() {
        let mut splitter = AccessUnitSplitter::new();
        assert!(splitter.push(&join_annexb([SPS, PPS, IDR])).is_empty());
        let units = splitter.finish();
        assert_eq!(units.len(), 2);
        assert!(matches!(units[1], StreamUnit::Picture { keyframe: true, .. }));
    }
}
