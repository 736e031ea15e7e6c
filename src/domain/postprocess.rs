use super::detection::Detection;
use super::errors::{DomainError, DomainResult};
use super::model::{RawOutput, YoloParams};

/// Upper bound on boxes entering suppression.
const MAX_NMS_CANDIDATES: usize = 30_000;

/// Decodes a raw YOLO output tensor into candidate detections in model-input
/// pixel space, already filtered by confidence.
///
/// Two layouts are understood: `[1, N, 5 + nc]` rows carrying an objectness
/// column (v5/v7 exports), and `[1, 4 + nc, N]` channel-major tensors
/// without it (v8 and later). The class count from `labels` picks the
/// layout; when it does not match, the longer axis is taken as the candidate
/// axis and row-major output is assumed to carry objectness.
pub fn decode_predictions(
    output: &RawOutput,
    params: &YoloParams,
    labels: &[String],
) -> DomainResult<Vec<Detection>> {
    let (a, b) = match output.shape.as_slice() {
        [_, a, b] | [a, b] => (*a, *b),
        other => {
            return Err(DomainError::Inference(format!(
                "unexpected output shape {other:?}"
            )))
        }
    };
    if output.data.len() < a * b {
        return Err(DomainError::Inference(format!(
            "output holds {} values, shape {:?} needs {}",
            output.data.len(),
            output.shape,
            a * b
        )));
    }

    let nc = labels.len();
    let fits = |n: usize| nc > 0 && (n == nc + 4 || n == nc + 5);
    let channel_major = if fits(b) {
        false
    } else if fits(a) {
        true
    } else {
        a < b
    };
    let (rows, attrs) = if channel_major { (b, a) } else { (a, b) };
    let has_objectness = if nc > 0 && attrs == nc + 5 {
        true
    } else if nc > 0 && attrs == nc + 4 {
        false
    } else {
        !channel_major
    };
    let class_offset = if has_objectness { 5 } else { 4 };
    if attrs <= class_offset {
        return Err(DomainError::Inference(format!(
            "output has {attrs} attributes per candidate, no class scores"
        )));
    }

    // Only the first image of a batch is used.
    let data = &output.data[..a * b];
    let at = |r: usize, c: usize| {
        if channel_major {
            data[c * rows + r]
        } else {
            data[r * attrs + c]
        }
    };

    let mut out = Vec::new();
    for r in 0..rows {
        let objectness = if has_objectness { at(r, 4) } else { 1.0 };
        if objectness < params.conf_threshold {
            continue;
        }

        let (class_id, class_score) = (class_offset..attrs)
            .map(|c| (c - class_offset, at(r, c)))
            .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
        let score = objectness * class_score;
        if score.is_nan() || score < params.conf_threshold {
            continue;
        }

        let (cx, cy, w, h) = (at(r, 0), at(r, 1), at(r, 2), at(r, 3));
        out.push(Detection {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
            score,
            class_id,
            label: labels
                .get(class_id)
                .cloned()
                .unwrap_or_else(|| format!("class{class_id}")),
        });
    }
    Ok(out)
}

/// Greedy non-max suppression, highest confidence first.
///
/// A detection is dropped when it scores below `conf_threshold`, or when it
/// overlaps an already kept detection with IoU >= `iou_threshold`. Overlap
/// only counts between equal classes unless `agnostic` is set.
pub fn non_max_suppression(mut dets: Vec<Detection>, params: &YoloParams) -> Vec<Detection> {
    dets.retain(|d| d.score >= params.conf_threshold);
    dets.sort_by(|a, b| b.score.total_cmp(&a.score));
    dets.truncate(MAX_NMS_CANDIDATES);

    let mut keep: Vec<Detection> = Vec::new();
    for d in dets {
        if keep.len() >= params.max_detections {
            break;
        }
        let suppressed = keep.iter().any(|k| {
            (params.agnostic || k.class_id == d.class_id) && k.iou(&d) >= params.iou_threshold
        });
        if !suppressed {
            keep.push(d);
        }
    }
    keep
}

/// Maps boxes from the letterboxed model input (`input_w x input_h`) back to
/// the original image, clipped and rounded to whole pixels.
pub fn scale_coords(
    dets: &mut [Detection],
    (input_w, input_h): (u32, u32),
    (orig_w, orig_h): (u32, u32),
) {
    let (iw, ih) = (input_w as f32, input_h as f32);
    let (ow, oh) = (orig_w as f32, orig_h as f32);
    let gain = (ih / oh).min(iw / ow);
    let pad_x = (iw - ow * gain) / 2.0;
    let pad_y = (ih - oh * gain) / 2.0;

    for d in dets.iter_mut() {
        d.x1 = ((d.x1 - pad_x) / gain).clamp(0.0, ow).round();
        d.x2 = ((d.x2 - pad_x) / gain).clamp(0.0, ow).round();
        d.y1 = ((d.y1 - pad_y) / gain).clamp(0.0, oh).round();
        d.y2 = ((d.y2 - pad_y) / gain).clamp(0.0, oh).round();
    }
}

/// Full post-processing for one image: decode, suppress, rescale.
pub fn postprocess(
    output: &RawOutput,
    params: &YoloParams,
    labels: &[String],
    input_size: (u32, u32),
    original_size: (u32, u32),
) -> DomainResult<Vec<Detection>> {
    let candidates = decode_predictions(output, params, labels)?;
    let mut kept = non_max_suppression(candidates, params);
    scale_coords(&mut kept, input_size, original_size);
    Ok(kept)
}
