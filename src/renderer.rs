//! WAV capture — drive a service offline and keep what it produces.

use std::io::Cursor;

use crate::error::Result;
use crate::protocol::GenerationRequest;
use crate::service::GenerationService;

/// Issue `buffers` consecutive generate requests and encode the output as a
/// 16-bit stereo PCM WAV at the request's resolved sample rate.
pub fn render_wav(
    service: &mut GenerationService,
    buffers: usize,
    request: &GenerationRequest,
) -> Result<Vec<u8>> {
    let resolved = request.resolve(service.config())?;
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: resolved.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut bytes = Vec::new();
    let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec)?;
    for _ in 0..buffers {
        let buffer = service.generate(request)?;
        for &s in buffer.as_slice() {
            writer.write_sample(to_pcm_i16(s))?;
        }
    }
    writer.finalize()?;
    log::debug!(
        "captured {buffers} buffers ({} bytes) at {} Hz",
        bytes.len(),
        resolved.sample_rate
    );
    Ok(bytes)
}

fn to_pcm_i16(s: f64) -> i16 {
    (s * 32767.0).round().clamp(-32768.0, 32767.0) as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeneratorError;
    use crate::track::Track;

    #[test]
    fn wav_matches_generated_frames() {
        let mut svc = GenerationService::new(Track::from_source(|t: f64| {
            if t < 0.5 { (1.0, -1.0) } else { (0.5, 0.0) }
        }));
        let req = GenerationRequest::new().with_sample_rate(8).with_channel_buffer_size(4);
        let wav = render_wav(&mut svc, 2, &req).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");

        let mut reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 8);
        let pcm: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(pcm.len(), 16);
        assert_eq!(&pcm[0..2], &[32767, -32767]);
        assert_eq!(&pcm[8..10], &[16384, 0]);
        assert_eq!(svc.cursor().position(), 8);
    }

    #[test]
    fn missing_entry_point_is_an_error() {
        let mut svc = GenerationService::new(Track::new());
        assert!(matches!(
            render_wav(&mut svc, 1, &GenerationRequest::new()),
            Err(GeneratorError::MissingEntryPoint)
        ));
    }

    #[test]
    fn pcm_conversion_saturates() {
        assert_eq!(to_pcm_i16(0.0), 0);
        assert_eq!(to_pcm_i16(1.0), 32767);
        assert_eq!(to_pcm_i16(-1.0), -32767);
    }
}
