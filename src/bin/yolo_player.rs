/// YOLO 视频播放器 (YOLO video player)
///
/// 系统架构:
/// 1. 解码线程: 视频解码, Timed 模式按帧率节流 (VideoPlayer)
/// 2. 推理线程: YOLO11 检测, 结果按帧序号对账 (InferenceWorker + ResultReconciler)
/// 3. 输入线程: 从 stdin 读取传输控制命令
/// 4. 主线程:   UI 事件循环, 合成叠加层并可选保存为 PNG
use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{select, unbounded, Sender};
use std::io::BufRead;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use yolo_player::{
    load_labels, share, OverlayRenderer, PipelineConfig, PlayerSession, RateMode, YoloConfig,
    YoloDetector, YoloTask,
};

/// 播放器参数
#[derive(Parser, Debug)]
#[command(author, version, about = "YOLO 视频播放器 - 播放视频并实时叠加检测结果", long_about = None)]
struct Args {
    /// 视频文件或图片序列目录
    #[arg(short, long)]
    source: PathBuf,

    /// ONNX 模型 (默认 ./model/<任务对应模型>)
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// 任务类型
    #[arg(short, long, value_enum, default_value_t = YoloTask::Detect)]
    task: YoloTask,

    /// 类别名文件 (默认 ./cfg/<任务对应类别>)
    #[arg(long)]
    labels: Option<PathBuf>,

    /// 速率模式: timed 或 continuous (覆盖配置文件)
    #[arg(long)]
    mode: Option<RateMode>,

    /// 流水线配置文件
    #[arg(long, default_value = "player_config.json")]
    config: PathBuf,

    /// 合成帧输出目录
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 置信度阈值
    #[arg(long, default_value_t = 0.25)]
    conf: f32,

    /// IoU 阈值
    #[arg(long, default_value_t = 0.45)]
    iou: f32,

    /// 模型输入尺寸
    #[arg(long, default_value_t = 640)]
    size: u32,

    /// ONNX Runtime 线程数
    #[arg(long, default_value_t = 4)]
    threads: usize,

    /// 打开后立即播放
    #[arg(long)]
    autoplay: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Play,
    Pause,
    Stop,
    Next,
    Prev,
    Seek(i64),
    Mode(RateMode),
    Info,
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    let mut parts = line.split_whitespace();
    let cmd = match parts.next()? {
        "play" | "p" => Command::Play,
        "pause" => Command::Pause,
        "stop" | "s" => Command::Stop,
        "next" | "n" => Command::Next,
        "prev" | "b" => Command::Prev,
        "seek" => Command::Seek(parts.next()?.parse().ok()?),
        "mode" | "m" => Command::Mode(parts.next()?.parse().ok()?),
        "info" | "i" => Command::Info,
        "quit" | "q" | "exit" => Command::Quit,
        _ => return None,
    };
    Some(cmd)
}

fn spawn_stdin_reader(tx: Sender<Command>) -> Result<()> {
    std::thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match parse_command(line) {
                    Some(cmd) => {
                        if tx.send(cmd).is_err() {
                            return;
                        }
                    }
                    None => println!(
                        "❓ 未知命令: {} (play/pause/stop/next/prev/seek N/mode timed|continuous/info/quit)",
                        line
                    ),
                }
            }
            let _ = tx.send(Command::Quit);
        })?;
    Ok(())
}

/// 执行一条传输命令; 返回 false 表示退出
fn apply(session: &mut PlayerSession, renderer: &OverlayRenderer, cmd: Command) -> bool {
    let ok = match cmd {
        Command::Play => session.play(),
        Command::Pause => session.pause(),
        Command::Stop => session.stop(),
        Command::Next => session.next_frame(),
        Command::Prev => session.prev_frame(),
        Command::Seek(index) => session.seek(index),
        Command::Mode(mode) => session.set_mode(mode),
        Command::Info => {
            print_info(session, renderer);
            true
        }
        Command::Quit => return false,
    };
    if !ok {
        println!("⚠️  命令执行失败: {:?}", cmd);
    }
    true
}

fn print_info(session: &PlayerSession, renderer: &OverlayRenderer) {
    if let Some(summary) = session.summary() {
        println!("📹 {}", summary);
    }
    println!(
        "▶️  {:?} | 模式 {} | 帧 {} ({} / {})",
        session.state(),
        session.mode(),
        session.current_frame(),
        session.player().frame_time_str(),
        session.player().total_time_str()
    );
    println!(
        "🧠 {} | 待推理 {} | 缓存 {} | 当前: [{}]",
        session.detector_name(),
        session.pending_frames(),
        session.cached_results(),
        renderer.describe()
    );
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = PipelineConfig::load(&args.config);
    if let Some(mode) = args.mode {
        config.rate_mode = mode;
    }

    let model = args.model.clone().unwrap_or_else(|| args.task.model_path("."));
    let labels_path = args.labels.clone().unwrap_or_else(|| args.task.labels_path("."));
    let labels = load_labels(&labels_path).unwrap_or_else(|e| {
        log::warn!("⚠️  {}, 使用类别序号", e);
        Vec::new()
    });

    println!("🚀 YOLO 视频播放器启动");
    println!("📦 模型: {} ({})", model.display(), args.task);
    println!("📹 视频: {}", args.source.display());
    println!();

    let detector = YoloDetector::new(YoloConfig {
        model: model.clone(),
        task: args.task,
        input_size: args.size,
        conf: args.conf,
        iou: args.iou,
        intra_threads: args.threads,
    })
    .with_context(|| format!("加载模型失败: {}", model.display()))?;

    let mut session = PlayerSession::new(config, share(detector)).context("创建播放会话失败")?;
    session
        .open(&args.source)
        .with_context(|| format!("打开视频失败: {}", args.source.display()))?;
    if let Some(summary) = session.summary() {
        println!("✅ {}", summary);
    }

    let mut renderer = OverlayRenderer::new(labels);
    if let Some(dir) = &args.output {
        renderer = renderer
            .with_output_dir(dir)
            .with_context(|| format!("无法创建输出目录: {}", dir.display()))?;
        println!("💾 合成帧输出到: {}", dir.display());
    }

    let (cmd_tx, cmd_rx) = unbounded();
    spawn_stdin_reader(cmd_tx)?;
    if args.autoplay {
        session.play();
    }

    // ========== 主线程: UI 事件循环 ==========
    let events = session.events().clone();
    let start = Instant::now();
    let mut shown = 0u64;
    let mut processed = 0usize;

    loop {
        select! {
            recv(events) -> event => {
                let Ok(event) = event else { break };
                if let Some(index) = renderer.handle(event)? {
                    session.frame_displayed(index);
                    shown += 1;
                }
            }
            recv(cmd_rx) -> cmd => {
                let Ok(cmd) = cmd else { break };
                if !apply(&mut session, &renderer, cmd) {
                    break;
                }
            }
            default(Duration::from_millis(500)) => {}
        }
        processed += session.drain_processed();
    }

    renderer.flush()?;
    session.close();

    let secs = start.elapsed().as_secs_f64().max(1e-3);
    println!(
        "👋 退出 | 显示 {} 帧 ({:.1} fps) | 推理 {} 帧 | 保存 {} 帧",
        shown,
        shown as f64 / secs,
        processed,
        renderer.saved()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse() {
        assert_eq!(parse_command("play"), Some(Command::Play));
        assert_eq!(parse_command("seek 120"), Some(Command::Seek(120)));
        assert_eq!(parse_command("mode continuous"), Some(Command::Mode(RateMode::Continuous)));
        assert_eq!(parse_command("m t"), Some(Command::Mode(RateMode::Timed)));
        assert_eq!(parse_command("seek"), None);
        assert_eq!(parse_command("seek abc"), None);
        assert_eq!(parse_command("jump"), None);
    }
}
