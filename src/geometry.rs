use crate::core::{HorizontalGravity, VerticalGravity};

/// Resolved cover-fit placement of the source image over the output region.
///
/// `draw_w x draw_h` matches the source aspect ratio (within ceil rounding)
/// and covers the output region; offsets are `<= 0` and push the overflow off
/// the gravity-opposite edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawGeometry {
    pub draw_w: u32,
    pub draw_h: u32,
    pub offset_x: i64,
    pub offset_y: i64,
}

const MAX_SIZING_PASSES: u32 = 5;

/// Compute draw dimensions and crop offsets for covering `output_w x output_h`
/// with a `source_w x source_h` image under the given gravity policy.
///
/// Pure function; callers cache the result rather than recomputing per frame.
/// All dimensions must be positive. Refinement alternates the axis matched
/// exactly to the output until the drawn area covers the output with a zero
/// delta on one axis, bailing out after five passes and accepting the last
/// candidate.
pub fn resolve_geometry(
    source_w: u32,
    source_h: u32,
    output_w: u32,
    output_h: u32,
    h_gravity: HorizontalGravity,
    v_gravity: VerticalGravity,
) -> DrawGeometry {
    debug_assert!(source_w > 0 && source_h > 0 && output_w > 0 && output_h > 0);

    let input_aspect = f64::from(source_w) / f64::from(source_h);
    tracing::debug!(
        output_w,
        output_h,
        source_w,
        source_h,
        input_aspect,
        "resolving draw geometry"
    );

    let mut draw_w = source_w;
    let mut draw_h = source_h;
    let mut passes = 0;

    let (delta_x, delta_y) = loop {
        let output_area = u64::from(output_w) * u64::from(output_h);
        let draw_area = u64::from(draw_w) * u64::from(draw_h);

        // Pick the axis with the larger shortfall (destination bigger) or the
        // larger excess (source bigger), match it to the output exactly and
        // derive the other axis from the source aspect, rounded up.
        let height_delta_wins = if output_area > draw_area {
            i64::from(output_h) - i64::from(draw_h) > i64::from(output_w) - i64::from(draw_w)
        } else {
            i64::from(draw_h) - i64::from(output_h) > i64::from(draw_w) - i64::from(output_w)
        };

        if height_delta_wins {
            draw_h = output_h;
            draw_w = (f64::from(draw_h) * input_aspect).ceil() as u32;
        } else {
            draw_w = output_w;
            draw_h = (f64::from(draw_w) / input_aspect).ceil() as u32;
        }

        // Wrapping subtraction mirrors the unsigned delta convention: a zero
        // delta means the axis is matched exactly.
        let delta_x = draw_w.wrapping_sub(output_w);
        let delta_y = draw_h.wrapping_sub(output_h);

        let matched = u64::from(draw_w) * u64::from(draw_h)
            >= u64::from(output_w) * u64::from(output_h)
            && (delta_x == 0 || delta_y == 0);
        passes += 1;
        if matched || passes >= MAX_SIZING_PASSES {
            break (delta_x, delta_y);
        }
    };

    let offset_x = match h_gravity {
        HorizontalGravity::Right if delta_x != 0 => -i64::from(delta_x),
        _ => 0,
    };
    let offset_y = match v_gravity {
        VerticalGravity::Bottom if delta_y != 0 => -i64::from(delta_y),
        _ => 0,
    };

    tracing::debug!(draw_w, draw_h, offset_x, offset_y, passes, "draw geometry resolved");

    DrawGeometry {
        draw_w,
        draw_h,
        offset_x,
        offset_y,
    }
}
