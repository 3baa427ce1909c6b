// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLO11 ONNX 检测器 (ONNX Runtime 后端)
// 一条 预处理 → 推理 → 后处理 流水线, 任务差异只体现在 TaskHead

use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::PathBuf;
use std::time::Instant;

use super::postprocess::{letterbox, stretch, DecodeParams, Letterbox, TaskHead};
use super::{Detector, YoloTask};
use crate::error::{PlayerError, Result};
use crate::types::{Detection, Frame};

/// 模型加载参数
#[derive(Debug, Clone)]
pub struct YoloConfig {
    pub model: PathBuf,
    pub task: YoloTask,
    pub input_size: u32,
    pub conf: f32,
    pub iou: f32,
    pub intra_threads: usize,
}

impl YoloConfig {
    pub fn new(model: impl Into<PathBuf>, task: YoloTask) -> Self {
        Self {
            model: model.into(),
            task,
            input_size: 640,
            conf: 0.25,
            iou: 0.45,
            intra_threads: 4,
        }
    }
}

pub struct YoloDetector {
    session: Session,
    config: YoloConfig,
    head: Option<TaskHead>, // 首次推理时根据输出形状确定
    name: String,
    count: u64,
}

fn ort_error(what: &str, err: impl std::fmt::Display) -> PlayerError {
    PlayerError::inference(format!("{}: {}", what, err))
}

impl YoloDetector {
    pub fn new(config: YoloConfig) -> Result<Self> {
        if !config.model.exists() {
            return Err(PlayerError::detector(format!(
                "model not found: {}",
                config.model.display()
            )));
        }
        if config.input_size == 0 || config.input_size % 32 != 0 {
            return Err(PlayerError::detector(format!(
                "input size must be a positive multiple of 32, got {}",
                config.input_size
            )));
        }

        let builder = Session::builder()
            .map_err(|e| ort_error("failed to build ORT session", e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| ort_error("failed to configure ORT optimization", e))?
            .with_intra_threads(config.intra_threads)
            .map_err(|e| ort_error("failed to set ORT threads", e))?;

        #[cfg(feature = "cuda")]
        let builder = builder
            .with_execution_providers([
                ort::execution_providers::CUDAExecutionProvider::default().build()
            ])
            .map_err(|e| ort_error("failed to register CUDA provider", e))?;

        let session = builder.commit_from_file(&config.model).map_err(|e| {
            PlayerError::detector(format!(
                "failed to load model {}: {}",
                config.model.display(),
                e
            ))
        })?;

        let name = format!(
            "yolo11-{} ({})",
            config.task,
            config
                .model
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        );
        log::info!(
            "✅ 模型加载完成: {} | 输入 {}x{} | conf {} | iou {}",
            name,
            config.input_size,
            config.input_size,
            config.conf,
            config.iou
        );

        Ok(Self {
            session,
            config,
            head: None,
            name,
            count: 0,
        })
    }

    pub fn task(&self) -> YoloTask {
        self.config.task
    }

    fn preprocess(&self, frame: &Frame) -> (Vec<f32>, Letterbox) {
        let size = self.config.input_size;
        match self.config.task {
            YoloTask::Classify => (
                stretch(&frame.image, size, size),
                Letterbox {
                    ratio: 1.0,
                    pad_x: 0.0,
                    pad_y: 0.0,
                },
            ),
            _ => letterbox(&frame.image, size, size),
        }
    }

    /// 返回第一个输出 (形状, 数据) 与第二个输出的形状
    fn infer(&mut self, input: Vec<f32>) -> Result<(Vec<usize>, Vec<f32>, Option<Vec<usize>>)> {
        let size = self.config.input_size as usize;
        let array = Array4::from_shape_vec((1, 3, size, size), input)
            .map_err(|e| ort_error("bad input tensor shape", e))?;
        let tensor = Tensor::from_array(array).map_err(|e| ort_error("failed to build ORT tensor", e))?;

        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(|e| ort_error("ORT inference failed", e))?;
        if outputs.len() == 0 {
            return Err(PlayerError::inference("model produced no outputs"));
        }

        let preds = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| ort_error("failed to read ORT output", e))?;
        let shape = preds.shape().to_vec();
        let data: Vec<f32> = preds.iter().copied().collect();

        let proto_shape = if outputs.len() > 1 {
            let protos = outputs[1]
                .try_extract_array::<f32>()
                .map_err(|e| ort_error("failed to read ORT output", e))?;
            Some(protos.shape().to_vec())
        } else {
            None
        };

        Ok((shape, data, proto_shape))
    }
}

impl Detector for YoloDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let t0 = Instant::now();
        let (input, lb) = self.preprocess(frame);
        let t_pre = t0.elapsed();

        let (shape, preds, proto_shape) = self.infer(input)?;
        let t_run = t0.elapsed() - t_pre;

        let head = match self.head {
            Some(head) => head,
            None => {
                let head = TaskHead::infer(self.config.task, &shape, proto_shape.as_deref())?;
                log::info!("🧠 输出头: {:?} (输出 {:?})", head, shape);
                self.head = Some(head);
                head
            }
        };

        let params = DecodeParams {
            conf: self.config.conf,
            iou: self.config.iou,
            frame_width: frame.width() as f32,
            frame_height: frame.height() as f32,
        };
        let ys = head.decode(&preds, &shape, &lb, &params);

        self.count += 1;
        log::trace!(
            "#{} 帧 {} | 预处理 {:?} | 推理 {:?} | 后处理 {:?} | {} 个目标",
            self.count,
            frame.index,
            t_pre,
            t_run,
            t0.elapsed() - t_pre - t_run,
            ys.len()
        );
        Ok(ys)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
