//! Play one or more wave (audio) files, mixed together.
//!
//! The stream can be driven three ways: device interrupts (the default),
//! a timerfd with drift correction (`--timer`), or SCHED_DEADLINE
//! (`--deadline`).

use anyhow::{bail, Context};
use clap::Parser;
use kpcm::mix::MixSample;
use kpcm::{deadline, Config, Flags, Format, Frames, Pcm, SyncFlags, TimerWakeup};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const RIFF_MAGIC: u32 = 0x4646_4952; // "RIFF"
const RIFF_TYPE_WAVE: u32 = 0x4556_4157; // "WAVE"
const CHUNK_FMT: u32 = 0x2074_6d66; // "fmt "
const CHUNK_DATA: u32 = 0x6174_6164; // "data"

#[derive(Parser, Debug)]
#[command(about = "Play wave files through the kernel PCM interface")]
struct Args {
    /// Sound card index.
    #[arg(short = 'c', long, default_value_t = 0)]
    card: u32,

    /// PCM device index on the card.
    #[arg(short = 'd', long, default_value_t = 0)]
    device: u32,

    /// Period size in frames.
    #[arg(short = 'p', long, default_value_t = 1024)]
    period_size: u64,

    /// Number of periods in the buffer.
    #[arg(short = 'n', long, default_value_t = 4)]
    periods: u32,

    /// Copy through the mapped ring buffer instead of WRITEI.
    #[arg(short = 'm', long)]
    mmap: bool,

    /// Pace the stream from a timerfd instead of device interrupts.
    #[arg(long, conflicts_with = "deadline")]
    timer: bool,

    /// Pace the stream with SCHED_DEADLINE.
    #[arg(long)]
    deadline: bool,

    /// Wave files to play; all are mixed into one stream.
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

/// Sample format of a wave file's data chunk.
#[derive(Debug, Clone, Copy)]
struct WaveInfo {
    channels: u16,
    rate: u32,
    bits_per_sample: u16,
}

struct WaveFile {
    reader: BufReader<File>,
    info: WaveInfo,
}

fn read_u32(r: &mut impl Read) -> anyhow::Result<u32> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)?;
    Ok(u32::from_le_bytes(b))
}

fn read_u16(r: &mut impl Read) -> anyhow::Result<u16> {
    let mut b = [0u8; 2];
    r.read_exact(&mut b)?;
    Ok(u16::from_le_bytes(b))
}

/// Open a RIFF/WAVE file and leave the reader at the first data byte.
fn open_wave(path: &PathBuf) -> anyhow::Result<WaveFile> {
    let file = File::open(path).with_context(|| format!("unable to open {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let magic = read_u32(&mut reader)?;
    let _size = read_u32(&mut reader)?;
    let riff_type = read_u32(&mut reader)?;
    if magic != RIFF_MAGIC || riff_type != RIFF_TYPE_WAVE {
        bail!("{} is not a riff/wave file", path.display());
    }

    let mut info = None;
    loop {
        let id = read_u32(&mut reader)?;
        let size = read_u32(&mut reader)?;
        match id {
            CHUNK_FMT => {
                let _format = read_u16(&mut reader)?;
                let channels = read_u16(&mut reader)?;
                let rate = read_u32(&mut reader)?;
                let _bytes_per_second = read_u32(&mut reader)?;
                let _bytes_per_sample = read_u16(&mut reader)?;
                let bits_per_sample = read_u16(&mut reader)?;
                info = Some(WaveInfo { channels, rate, bits_per_sample });
                // skip any extension of the fmt chunk
                if size > 16 {
                    reader.seek(SeekFrom::Current((size - 16) as i64))?;
                }
            }
            CHUNK_DATA => break,
            _ => {
                reader.seek(SeekFrom::Current(size as i64))?;
            }
        }
    }

    let info = info.ok_or_else(|| anyhow::anyhow!("{} has no fmt chunk", path.display()))?;
    Ok(WaveFile { reader, info })
}

/// Samples the player can mix and hand to the device.
trait Sample: MixSample + Default {
    fn from_le(bytes: &[u8]) -> Self;
    fn put_le(self, out: &mut Vec<u8>);
}

impl Sample for i16 {
    fn from_le(bytes: &[u8]) -> i16 {
        i16::from_le_bytes([bytes[0], bytes[1]])
    }
    fn put_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl Sample for i32 {
    fn from_le(bytes: &[u8]) -> i32 {
        i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
    fn put_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

/// Read up to `samples` samples from one file. Returns how many were read.
fn read_samples<S: Sample>(file: &mut WaveFile, dst: &mut [S]) -> anyhow::Result<usize> {
    let width = std::mem::size_of::<S>();
    let mut bytes = vec![0u8; dst.len() * width];
    let mut got = 0;
    // plain read: the data chunk may end mid-buffer
    while got < bytes.len() {
        let n = file.reader.read(&mut bytes[got..])?;
        if n == 0 {
            break;
        }
        got += n;
    }
    let samples = got / width;
    for (i, d) in dst.iter_mut().take(samples).enumerate() {
        *d = S::from_le(&bytes[i * width..(i + 1) * width]);
    }
    Ok(samples)
}

struct Player<S: Sample> {
    files: Vec<WaveFile>,
    scratch: Vec<S>,
    dst: Vec<S>,
    sum: Vec<S::Accum>,
    bytes: Vec<u8>,
}

impl<S: Sample> Player<S> {
    fn new(files: Vec<WaveFile>, max_samples: usize) -> Player<S> {
        Player {
            files,
            scratch: vec![S::default(); max_samples],
            dst: vec![S::default(); max_samples],
            sum: vec![S::Accum::default(); max_samples],
            bytes: Vec::with_capacity(max_samples * std::mem::size_of::<S>()),
        }
    }

    /// Mix the next `samples` samples of every file; returns the mixed
    /// block as bytes, or the longest file's tail when sources run dry.
    fn next_block(&mut self, samples: usize) -> anyhow::Result<&[u8]> {
        self.dst[..samples].fill(S::default());
        self.sum[..samples].fill(S::Accum::default());
        let mut longest = 0;
        for file in &mut self.files {
            self.scratch[..samples].fill(S::default());
            let got = read_samples(file, &mut self.scratch[..samples])?;
            if got > 0 {
                kpcm::mix::mix(&mut self.dst[..got], &self.scratch[..got], &mut self.sum[..got]);
            }
            longest = longest.max(got);
        }
        self.bytes.clear();
        for s in &self.dst[..longest] {
            s.put_le(&mut self.bytes);
        }
        Ok(&self.bytes)
    }
}

fn build_config(args: &Args, info: &WaveInfo) -> anyhow::Result<Config> {
    let format = match info.bits_per_sample {
        16 => Format::S16LE,
        32 => Format::S32LE,
        bits => bail!("unsupported sample width: {bits} bits"),
    };
    let mut flags = Flags::NONBLOCK;
    if args.mmap {
        flags |= Flags::MMAP;
    }
    Ok(Config {
        card: args.card,
        device: args.device,
        flags,
        format,
        channels: info.channels as u32,
        rate: info.rate,
        period_size: args.period_size as Frames,
        period_count: args.periods,
        ..Config::default()
    })
}

/// Interrupt-driven loop: poll the PCM fd, mix a period, write it.
fn run_poll<S: Sample>(
    pcm: &mut Pcm,
    player: &mut Player<S>,
    channels: usize,
    period_size: usize,
    keep_running: &AtomicBool,
) -> anyhow::Result<()> {
    pcm.start()?;
    while keep_running.load(Ordering::Relaxed) {
        let revents = pcm.wait(-1)?;
        if revents.contains(kpcm::PollFlags::POLLERR) {
            continue;
        }

        let block_len = {
            let block = player.next_block(period_size * channels)?;
            if block.is_empty() {
                break;
            }
            block.len()
        };
        pcm.sync(SyncFlags::GET)?;
        let block = &player.bytes[..block_len];
        pcm.write(block).context("error playing sample")?;
    }
    pcm.stop()?;
    Ok(())
}

/// Clock-driven loop shared by `--timer` and `--deadline`.
fn run_clocked<S: Sample>(
    args: &Args,
    config: &Config,
    files: Vec<WaveFile>,
    channels: usize,
    keep_running: &AtomicBool,
) -> anyhow::Result<()> {
    let period_size = args.period_size as usize;
    let (mut timer, mut pcm) = TimerWakeup::open(config, period_size as Frames)?;
    // corrections can stretch a tick past one period; give the transfer
    // a period of slack on top of the mixed block
    let period_samples = period_size * channels;
    let frame_bytes = channels * std::mem::size_of::<S>();
    let slack_bytes = period_size * frame_bytes;
    let mut player: Player<S> = Player::new(files, period_samples);

    if args.deadline {
        deadline::start(&timer, &mut pcm)?;
    } else {
        timer.start(&mut pcm)?;
    }

    while keep_running.load(Ordering::Relaxed) {
        if args.deadline {
            deadline::yield_period();
        } else {
            timer.wait()?;
        }

        if player.next_block(period_samples)?.is_empty() {
            break;
        }
        // duplicate the last frame into the slack so a positive
        // correction stretches the tail instead of clicking
        let mut block = std::mem::take(&mut player.bytes);
        if block.len() >= frame_bytes {
            let tail = block.len() - frame_bytes;
            while block.len() < tail + frame_bytes + slack_bytes {
                block.extend_from_within(tail..tail + frame_bytes);
            }
        }

        pcm.sync(SyncFlags::GET | SyncFlags::HWSYNC)?;
        let r = timer.write(&mut pcm, &mut block);
        player.bytes = block;
        r.context("error playing sample")?;
    }
    pcm.stop()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let keep_running = Arc::new(AtomicBool::new(true));
    {
        let keep_running = keep_running.clone();
        ctrlc::set_handler(move || keep_running.store(false, Ordering::Relaxed))?;
    }

    let mut files = Vec::new();
    for path in &args.files {
        files.push(open_wave(path)?);
    }
    // all files are played with the first one's parameters
    let info = files[0].info;
    let config = build_config(&args, &info)?;

    println!(
        "Channels: {}, {} Hz, {}-bits, Access {}",
        info.channels,
        info.rate,
        info.bits_per_sample,
        if args.mmap { "MMAP" } else { "RW" }
    );

    let channels = info.channels as usize;
    if args.timer || args.deadline {
        match info.bits_per_sample {
            16 => run_clocked::<i16>(&args, &config, files, channels, &keep_running)?,
            _ => run_clocked::<i32>(&args, &config, files, channels, &keep_running)?,
        }
    } else {
        let mut pcm = Pcm::open(&config)?;
        let period_size = args.period_size as usize;
        let samples = period_size * channels;
        match info.bits_per_sample {
            16 => run_poll(
                &mut pcm,
                &mut Player::<i16>::new(files, samples),
                channels,
                period_size,
                &keep_running,
            )?,
            _ => run_poll(
                &mut pcm,
                &mut Player::<i32>::new(files, samples),
                channels,
                period_size,
                &keep_running,
            )?,
        }
    }

    Ok(())
}
