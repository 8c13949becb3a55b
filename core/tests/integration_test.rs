use fsklink_core::framing::FrameEncoder;
use fsklink_core::{
    Complex32, CrcParams, FskModulator, ModemConfig, ModemError, Packet, Receiver, SliceSource,
    Transmitter,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn decode(config: &ModemConfig, samples: &[Complex32]) -> (Receiver, Vec<Packet>) {
    let mut receiver = Receiver::new(config).expect("Failed to create receiver");
    let packets = receiver
        .run(&mut SliceSource::new(samples))
        .expect("Receiver failed");
    (receiver, packets)
}

/// Modulated frame bytes placed `lead_samples` into the stream, followed by enough
/// silence for the receiver to take the whole burst.
fn place_frame(config: &ModemConfig, frame: &[u8], lead_samples: usize) -> Vec<Complex32> {
    let mut samples = vec![Complex32::default(); lead_samples];
    samples.extend(FskModulator::new(config).unwrap().modulate(frame));
    samples.extend(vec![Complex32::default(); config.burst_len() + 4 * config.block_len()]);
    samples
}

fn rotate(samples: &[Complex32], cfo_hz: f64, sample_rate: f64) -> Vec<Complex32> {
    samples
        .iter()
        .enumerate()
        .map(|(n, s)| {
            let phase = 2.0 * PI * cfo_hz * n as f64 / sample_rate;
            *s * Complex32::new(phase.cos() as f32, phase.sin() as f32)
        })
        .collect()
}

fn add_noise(samples: &mut [Complex32], sigma: f32, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0f32, sigma).unwrap();
    for s in samples.iter_mut() {
        *s += Complex32::new(normal.sample(&mut rng), normal.sample(&mut rng));
    }
}

#[test]
fn test_single_packet_round_trip() {
    init_logging();
    let config = ModemConfig::default();
    let payload = b"Hello, FSK link!".to_vec();

    let samples = Transmitter::new(&config)
        .unwrap()
        .transmit(&[payload.clone()])
        .expect("Failed to transmit");
    let (receiver, packets) = decode(&config, &samples);

    assert_eq!(packets.len(), 1, "Expected exactly one packet");
    assert_eq!(packets[0].payload(), payload.as_slice());
    assert!(packets[0].is_valid());

    let stats = receiver.stats();
    assert_eq!(stats.bursts_detected, 1);
    assert_eq!(stats.packets_seen, 1);
    assert_eq!(stats.packets_ok, 1);

    let estimate = receiver.last_estimate().expect("No burst estimate");
    assert_eq!(estimate.sto, 0);
    assert!(estimate.cfo_hz.abs() < 0.5);
}

#[test]
fn test_corrupted_payload_is_rejected() {
    init_logging();
    let config = ModemConfig::default();
    let mut frame = FrameEncoder::encode(&config, b"will be damaged.").unwrap();
    frame[10] ^= 0x10;

    let samples = place_frame(&config, &frame, 4 * config.block_len());
    let (receiver, packets) = decode(&config, &samples);

    assert!(packets.is_empty(), "Corrupted packet must not be emitted");
    let stats = receiver.stats();
    assert_eq!(stats.bursts_detected, 1);
    assert_eq!(stats.packets_seen, 1);
    assert_eq!(stats.packets_ok, 0);
    assert_eq!(stats.crc_failures, 1);
}

#[test]
fn test_silence_and_weak_noise_detect_nothing() {
    let config = ModemConfig::default();

    let silence = vec![Complex32::default(); 20_000];
    let (receiver, packets) = decode(&config, &silence);
    assert!(packets.is_empty());
    assert_eq!(receiver.stats().bursts_detected, 0);

    let mut noise = vec![Complex32::default(); 20_000];
    add_noise(&mut noise, 0.1, 11);
    let (receiver, packets) = decode(&config, &noise);
    assert!(packets.is_empty());
    assert_eq!(receiver.stats().bursts_detected, 0);
    assert!(receiver.last_estimate().is_none());
}

#[test]
fn test_multiple_bursts_in_order() {
    init_logging();
    let config = ModemConfig::default();
    let payloads: Vec<Vec<u8>> = (0..5u8).map(|i| vec![i.wrapping_mul(37); 16]).collect();

    let samples = Transmitter::new(&config)
        .unwrap()
        .transmit(&payloads)
        .unwrap();
    let (receiver, packets) = decode(&config, &samples);

    let received: Vec<Vec<u8>> = packets.into_iter().map(Packet::into_payload).collect();
    assert_eq!(received, payloads);
    let stats = receiver.stats();
    assert_eq!(stats.bursts_detected, 5);
    assert_eq!(stats.bursts_synchronized, 5);
    assert_eq!(stats.crc_failures, 0);
}

#[test]
fn test_sub_symbol_offset_is_recovered() {
    init_logging();
    let config = ModemConfig::default();
    let payload = b"off by 3 samples";
    let frame = FrameEncoder::encode(&config, payload).unwrap();

    // Frame starts 3 samples into detector block 10
    let samples = place_frame(&config, &frame, 10 * config.block_len() + 3);
    let (receiver, packets) = decode(&config, &samples);

    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].payload(), payload);
    assert_eq!(receiver.last_estimate().unwrap().sto, 3);
}

#[test]
fn test_low_energy_lead_in_then_frame() {
    init_logging();
    let config = ModemConfig::default();
    let payload = b"after a lead-in.";
    let frame = FrameEncoder::encode(&config, payload).unwrap();

    // 60 weak samples, so the frame straddles the first two detector blocks
    let mut samples = vec![Complex32::new(0.05, -0.05); 60];
    samples.extend(place_frame(&config, &frame, 0));
    let (receiver, packets) = decode(&config, &samples);

    assert_eq!(receiver.stats().bursts_detected, 1);
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].payload(), payload);
}

#[test]
fn test_carrier_offset_is_estimated_and_removed() {
    init_logging();
    let config = ModemConfig::default();
    let payload = b"drifting carrier".to_vec();
    let clean = Transmitter::new(&config)
        .unwrap()
        .transmit(&[payload.clone()])
        .unwrap();

    for cfo in [40.0, -65.0] {
        let samples = rotate(&clean, cfo, config.sample_rate as f64);
        let (receiver, packets) = decode(&config, &samples);

        assert_eq!(packets.len(), 1, "Packet lost at CFO {cfo} Hz");
        assert_eq!(packets[0].payload(), payload.as_slice());
        let estimate = receiver.last_estimate().unwrap().cfo_hz;
        assert!((estimate - cfo).abs() < 0.5, "CFO {cfo} Hz estimated as {estimate}");
    }
}

#[test]
fn test_packets_survive_gaussian_noise() {
    init_logging();
    let config = ModemConfig {
        noise_power: Some(0.02),
        ..Default::default()
    };
    let mut rng = StdRng::seed_from_u64(2024);
    let payloads: Vec<Vec<u8>> = (0..4)
        .map(|_| (0..16).map(|_| rng.gen()).collect())
        .collect();

    let mut samples = Transmitter::new(&config)
        .unwrap()
        .transmit(&payloads)
        .unwrap();
    add_noise(&mut samples, 0.1, 99);
    let (receiver, packets) = decode(&config, &samples);

    let received: Vec<Vec<u8>> = packets.into_iter().map(Packet::into_payload).collect();
    assert_eq!(received, payloads);

    let snr = receiver.last_estimate().unwrap().snr_db.expect("SNR not reported");
    assert!(snr > 10.0 && snr < 25.0, "Unexpected SNR {snr} dB");
}

#[test]
fn test_threshold_gates_weak_bursts() {
    let payload = b"quiet transmitr!".to_vec();
    let loud = Transmitter::new(&ModemConfig::default())
        .unwrap()
        .transmit(&[payload.clone()])
        .unwrap();
    let weak: Vec<Complex32> = loud.iter().map(|s| *s * 0.4).collect();

    let strict = ModemConfig::default();
    let (receiver, packets) = decode(&strict, &weak);
    assert!(packets.is_empty());
    assert_eq!(receiver.stats().bursts_detected, 0);

    let lenient = ModemConfig {
        energy_threshold: 0.3,
        ..Default::default()
    };
    let (receiver, packets) = decode(&lenient, &weak);
    assert_eq!(receiver.stats().bursts_detected, 1);
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].payload(), payload.as_slice());
}

#[test]
fn test_raising_threshold_never_adds_bursts() {
    let config = ModemConfig::default();
    let spacing = 3_200;

    // Constant-magnitude blips of rising strength plus one real frame, each far
    // enough apart that a burst window never reaches the next one
    let mut samples = vec![Complex32::default(); spacing * 8];
    for (k, amplitude) in [0.25f32, 0.4, 0.55, 0.7, 0.9, 1.1].iter().enumerate() {
        let start = spacing * k + 20;
        for s in &mut samples[start..start + 128] {
            *s = Complex32::new(0.0, *amplitude);
        }
    }
    let frame = FrameEncoder::encode(&config, b"among the blips.").unwrap();
    let modulated = FskModulator::new(&config).unwrap().modulate(&frame);
    let start = spacing * 6 + 20;
    samples[start..start + modulated.len()].copy_from_slice(&modulated);
    add_noise(&mut samples, 0.05, 5);

    let thresholds = [0.2f32, 0.3, 0.45, 0.6, 0.8, 0.95, 1.3];
    let counts: Vec<u64> = thresholds
        .iter()
        .map(|&energy_threshold| {
            let config = ModemConfig {
                energy_threshold,
                ..Default::default()
            };
            decode(&config, &samples).0.stats().bursts_detected
        })
        .collect();

    for pair in counts.windows(2) {
        assert!(pair[1] <= pair[0], "Burst counts rose with the threshold: {counts:?}");
    }
    assert_eq!(counts[0], 7, "{counts:?}");
    assert_eq!(counts[thresholds.len() - 1], 0, "{counts:?}");
}

#[test]
fn test_stream_ending_mid_burst_emits_nothing() {
    init_logging();
    let config = ModemConfig::default();
    let samples = Transmitter::new(&config)
        .unwrap()
        .transmit(&[b"cut off halfway.".to_vec()])
        .unwrap();

    let gap = 4 * config.block_len();
    let truncated = &samples[..gap + config.burst_len() / 2];
    let (receiver, packets) = decode(&config, truncated);

    assert!(packets.is_empty());
    let stats = receiver.stats();
    assert_eq!(stats.bursts_detected, 1);
    assert_eq!(stats.packets_seen, 0);
    assert_eq!(stats.crc_failures, 0);
}

#[test]
fn test_one_sample_pushes_match_batch_decode() {
    let config = ModemConfig::default();
    let payloads = vec![b"one sample at a ".to_vec(), b"time, two frames".to_vec()];
    let samples = Transmitter::new(&config)
        .unwrap()
        .transmit(&payloads)
        .unwrap();

    let mut receiver = Receiver::new(&config).unwrap();
    let mut packets = Vec::new();
    for sample in &samples {
        packets.extend(receiver.push(std::slice::from_ref(sample)).unwrap());
    }
    let received: Vec<Vec<u8>> = packets.into_iter().map(Packet::into_payload).collect();
    assert_eq!(received, payloads);
}

#[test]
fn test_custom_link_parameters() {
    init_logging();
    let config = ModemConfig {
        data_rate: 4_800,
        frequency_deviation: 2_400.0,
        header_len: 4,
        sync_word: vec![0x2D, 0xD4, 0x2D, 0xD4],
        payload_len: 32,
        crc_len: 2,
        crc: CrcParams {
            width: 16,
            poly: 0x1021,
            init: 0xFFFF,
            ..Default::default()
        },
        ..Default::default()
    };
    assert_eq!(config.osr(), 10);

    let payload: Vec<u8> = (0..32).collect();
    let samples = Transmitter::new(&config)
        .unwrap()
        .transmit(&[payload.clone()])
        .unwrap();
    let samples = rotate(&samples, 25.0, config.sample_rate as f64);
    let (receiver, packets) = decode(&config, &samples);

    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].payload(), payload.as_slice());
    assert_eq!(packets[0].crc().len(), 2);
    assert!((receiver.last_estimate().unwrap().cfo_hz - 25.0).abs() < 0.5);
}

#[test]
fn test_arbitrary_data_round_trip() {
    let config = ModemConfig::default();
    let data: Vec<u8> = (0..40u8).map(|b| b ^ 0x5C).collect();

    let samples = Transmitter::new(&config).unwrap().encode_data(&data).unwrap();
    let (_, packets) = decode(&config, &samples);
    assert_eq!(packets.len(), 3);

    let mut received: Vec<u8> = packets.into_iter().flat_map(Packet::into_payload).collect();
    assert!(received[data.len()..].iter().all(|&b| b == 0));
    received.truncate(data.len());
    assert_eq!(received, data);
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = ModemConfig {
        data_rate: 7_000,
        ..Default::default()
    };
    assert!(matches!(
        Receiver::new(&config),
        Err(ModemError::InvalidConfig(_))
    ));
    assert!(Transmitter::new(&config).is_err());

    let oversized = ModemConfig {
        payload_len: usize::MAX / 16,
        ..Default::default()
    };
    assert!(matches!(
        Receiver::new(&oversized),
        Err(ModemError::InvalidConfig(_))
    ));
}
