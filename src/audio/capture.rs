use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::traits::Producer;
use tracing::{error, info};

use crate::transport::AUDIO_SAMPLE_RATE;

pub struct AudioCapture {
    _stream: cpal::Stream,
    pub sample_rate: u32,
}

impl AudioCapture {
    pub fn new<P>(mut producer: P) -> Result<Self, anyhow::Error>
    where
        P: Producer<Item = f32> + Send + 'static,
    {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow::anyhow!("no input device available"))?;

        info!("audio input device: {}", device.name().unwrap_or_default());

        // The agent consumes 16 kHz PCM, so only a config that can deliver
        // that rate is acceptable.
        let mut selected = None;
        for range in device.supported_input_configs()? {
            if range.min_sample_rate().0 <= AUDIO_SAMPLE_RATE
                && range.max_sample_rate().0 >= AUDIO_SAMPLE_RATE
            {
                selected = Some(range.with_sample_rate(cpal::SampleRate(AUDIO_SAMPLE_RATE)));
                break;
            }
        }
        let config = selected.ok_or_else(|| {
            anyhow::anyhow!(
                "input device does not support {} Hz capture",
                AUDIO_SAMPLE_RATE
            )
        })?;

        let channels = config.channels() as usize;
        info!(
            "audio config selected: rate={}Hz, channels={}",
            AUDIO_SAMPLE_RATE, channels
        );

        let err_fn = |err| error!("input stream error: {}", err);

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => device.build_input_stream(
                &config.into(),
                move |data: &[f32], _: &_| write_input_data(data, channels, &mut producer),
                err_fn,
                None,
            )?,
            cpal::SampleFormat::I16 => device.build_input_stream(
                &config.into(),
                move |data: &[i16], _: &_| write_input_data_i16(data, channels, &mut producer),
                err_fn,
                None,
            )?,
            _ => return Err(anyhow::anyhow!("unsupported sample format")),
        };

        stream.play()?;

        Ok(Self {
            _stream: stream,
            sample_rate: AUDIO_SAMPLE_RATE,
        })
    }
}

// Channel 0 only; the agent expects mono. If the ring is full the samples
// are dropped (lossy).
fn write_input_data<P>(input: &[f32], channels: usize, producer: &mut P)
where
    P: Producer<Item = f32>,
{
    if channels <= 1 {
        producer.push_slice(input);
    } else {
        for frame in input.chunks(channels) {
            let _ = producer.try_push(frame[0]);
        }
    }
}

fn write_input_data_i16<P>(input: &[i16], channels: usize, producer: &mut P)
where
    P: Producer<Item = f32>,
{
    for frame in input.chunks(channels.max(1)) {
        let sample_f32 = frame[0] as f32 / i16::MAX as f32;
        let _ = producer.try_push(sample_f32);
    }
}
