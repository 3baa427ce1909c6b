/// YOLO 前后处理公共部分 (Shared pre/post-processing)
///
/// - letterbox: 等比缩放 + 灰色填充, 记录缩放比例与偏移
/// - TaskHead: 五种任务的输出头, 统一解码为帧坐标下的 `Detection`
/// - non_max_suppression: 按类别的 IoU 抑制
/// - color_for: 类别调色板
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

use super::YoloTask;
use crate::error::{PlayerError, Result};
use crate::types::{BBox, Detection};

/// 填充灰度值 (与训练时一致)
const PAD_VALUE: f32 = 144.0 / 255.0;
const CXYWH_OFFSET: usize = 4;
const KPT_STEP: usize = 3;

/// 类别配色
const BRIGHT_COLORS: [(u8, u8, u8); 12] = [
    (255, 0, 0),     // 红色
    (0, 255, 0),     // 绿色
    (0, 0, 255),     // 蓝色
    (255, 255, 0),   // 黄色
    (255, 0, 255),   // 品红
    (0, 255, 255),   // 青色
    (255, 128, 0),   // 橙色
    (255, 0, 128),   // 粉红
    (128, 255, 0),   // 黄绿
    (0, 128, 255),   // 天蓝
    (255, 255, 255), // 白色
    (128, 0, 255),   // 紫色
];

pub fn color_for(class_id: usize) -> Rgb<u8> {
    let (r, g, b) = BRIGHT_COLORS[class_id % BRIGHT_COLORS.len()];
    Rgb([r, g, b])
}

/// 输入张量 → 原图 的坐标变换
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub ratio: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl Letterbox {
    /// 把网络输入坐标系下的 (cx, cy, w, h) 映射回原图并裁剪
    pub fn restore(&self, cx: f32, cy: f32, w: f32, h: f32, frame_w: f32, frame_h: f32) -> BBox {
        let cx = (cx - self.pad_x) / self.ratio;
        let cy = (cy - self.pad_y) / self.ratio;
        let w = w / self.ratio;
        let h = h / self.ratio;
        BBox::from_cxcywh(cx, cy, w, h).clamp(frame_w, frame_h)
    }
}

fn to_chw(img: &RgbImage, width: u32, height: u32, offset: (u32, u32)) -> Vec<f32> {
    let plane = (width * height) as usize;
    let mut data = vec![PAD_VALUE; plane * 3];
    for (x, y, rgb) in img.enumerate_pixels() {
        let idx = ((y + offset.1) * width + (x + offset.0)) as usize;
        data[idx] = rgb[0] as f32 / 255.0;
        data[plane + idx] = rgb[1] as f32 / 255.0;
        data[2 * plane + idx] = rgb[2] as f32 / 255.0;
    }
    data
}

/// 等比缩放到 `width x height` 并居中填充, 返回 CHW 归一化数据
pub fn letterbox(image: &RgbImage, width: u32, height: u32) -> (Vec<f32>, Letterbox) {
    let (w0, h0) = (image.width() as f32, image.height() as f32);
    let ratio = (width as f32 / w0).min(height as f32 / h0);
    let w_new = ((w0 * ratio).round() as u32).clamp(1, width);
    let h_new = ((h0 * ratio).round() as u32).clamp(1, height);
    let pad_x = (width - w_new) / 2;
    let pad_y = (height - h_new) / 2;

    let resized = imageops::resize(image, w_new, h_new, FilterType::Triangle);
    let data = to_chw(&resized, width, height, (pad_x, pad_y));
    (
        data,
        Letterbox {
            ratio,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
        },
    )
}

/// 分类模型直接拉伸, 不保持比例
pub fn stretch(image: &RgbImage, width: u32, height: u32) -> Vec<f32> {
    let resized = imageops::resize(image, width, height, FilterType::Triangle);
    to_chw(&resized, width, height, (0, 0))
}

/// 按类别的非极大值抑制, 结果按置信度降序
pub fn non_max_suppression(xs: &mut Vec<Detection>, iou_threshold: f32) {
    xs.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            if xs[prev_index].class_id != xs[index].class_id {
                continue;
            }
            if xs[prev_index].bbox.iou(&xs[index].bbox) > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

/// 阈值与原图尺寸
#[derive(Debug, Clone, Copy)]
pub struct DecodeParams {
    pub conf: f32,
    pub iou: f32,
    pub frame_width: f32,
    pub frame_height: f32,
}

/// 模型输出头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskHead {
    Detect { nc: usize },
    Classify,
    Segment { nc: usize, nm: usize },
    Pose { nk: usize },
    Obb { nc: usize },
}

impl TaskHead {
    /// 根据输出张量形状推断类别数/关键点数/掩码系数个数
    ///
    /// - 检测/分割/姿态/旋转框: `[1, rows, anchors]`
    /// - 分类: `[1, nc]`
    /// - 分割的第二个输出 (原型掩码): `[1, nm, h, w]`
    pub fn infer(task: YoloTask, pred_shape: &[usize], proto_shape: Option<&[usize]>) -> Result<Self> {
        if task == YoloTask::Classify {
            return match pred_shape {
                [1, nc] if *nc > 0 => Ok(TaskHead::Classify),
                _ => Err(shape_error(task, pred_shape)),
            };
        }

        let rows = match pred_shape {
            [1, rows, _] => *rows,
            _ => return Err(shape_error(task, pred_shape)),
        };

        let head = match task {
            YoloTask::Detect if rows > CXYWH_OFFSET => TaskHead::Detect {
                nc: rows - CXYWH_OFFSET,
            },
            YoloTask::Segment => {
                let nm = match proto_shape {
                    Some([1, nm, _, _]) => *nm,
                    _ => return Err(PlayerError::inference("segment model without mask prototypes")),
                };
                if rows <= CXYWH_OFFSET + nm {
                    return Err(shape_error(task, pred_shape));
                }
                TaskHead::Segment {
                    nc: rows - CXYWH_OFFSET - nm,
                    nm,
                }
            }
            YoloTask::Pose if rows > CXYWH_OFFSET + 1 && (rows - CXYWH_OFFSET - 1) % KPT_STEP == 0 => {
                TaskHead::Pose {
                    nk: (rows - CXYWH_OFFSET - 1) / KPT_STEP,
                }
            }
            YoloTask::Obb if rows > CXYWH_OFFSET + 1 => TaskHead::Obb {
                nc: rows - CXYWH_OFFSET - 1,
            },
            _ => return Err(shape_error(task, pred_shape)),
        };
        Ok(head)
    }

    /// 类别分数所在的行区间
    fn class_rows(&self) -> (usize, usize) {
        match *self {
            TaskHead::Detect { nc } | TaskHead::Segment { nc, .. } | TaskHead::Obb { nc } => {
                (CXYWH_OFFSET, CXYWH_OFFSET + nc)
            }
            TaskHead::Pose { .. } => (CXYWH_OFFSET, CXYWH_OFFSET + 1),
            TaskHead::Classify => (0, 0),
        }
    }

    /// 解码第一个输出张量 (行优先, 形状同 `infer`)
    pub fn decode(
        &self,
        preds: &[f32],
        shape: &[usize],
        letterbox: &Letterbox,
        params: &DecodeParams,
    ) -> Vec<Detection> {
        if let TaskHead::Classify = self {
            return decode_classify(preds, params);
        }

        let (rows, anchors) = match shape {
            [_, rows, anchors] => (*rows, *anchors),
            _ => return Vec::new(),
        };
        if preds.len() < rows * anchors {
            log::warn!("⚠️  输出长度 {} 小于 {}x{}", preds.len(), rows, anchors);
            return Vec::new();
        }
        let at = |r: usize, a: usize| preds[r * anchors + a];
        let (c0, c1) = self.class_rows();

        let mut ys = Vec::new();
        for a in 0..anchors {
            let (id, confidence) = (c0..c1)
                .map(|r| at(r, a))
                .enumerate()
                .fold((0, f32::MIN), |max, x| if x.1 > max.1 { x } else { max });
            if confidence < params.conf {
                continue;
            }

            let (cx, cy, mut w, mut h) = (at(0, a), at(1, a), at(2, a), at(3, a));
            if let TaskHead::Obb { nc } = self {
                // 旋转框取外接矩形
                let angle = at(CXYWH_OFFSET + nc, a);
                let (sin, cos) = angle.sin_cos();
                let (rw, rh) = (w, h);
                w = rw * cos.abs() + rh * sin.abs();
                h = rw * sin.abs() + rh * cos.abs();
            }

            let bbox = letterbox.restore(cx, cy, w, h, params.frame_width, params.frame_height);
            if bbox.area() <= 0.0 {
                continue;
            }
            ys.push(Detection::new(bbox, confidence, id));
        }

        non_max_suppression(&mut ys, params.iou);
        ys
    }
}

fn decode_classify(preds: &[f32], params: &DecodeParams) -> Vec<Detection> {
    let top1 = preds
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, x| match best {
            Some(b) if b.1 >= x.1 => Some(b),
            _ => Some(x),
        });
    match top1 {
        Some((id, confidence)) if confidence >= params.conf => {
            let bbox = BBox::new(0.0, 0.0, params.frame_width, params.frame_height);
            vec![Detection::new(bbox, confidence, id)]
        }
        _ => Vec::new(),
    }
}

fn shape_error(task: YoloTask, shape: &[usize]) -> PlayerError {
    PlayerError::inference(format!("unexpected {} output shape {:?}", task, shape))
}
