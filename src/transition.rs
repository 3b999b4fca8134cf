use crate::{
    error::{ReelError, ReelResult},
    model::TransitionEffect,
    surface::Surface,
};

/// Scale the outgoing slide grows to over a zoom transition.
const ZOOM_OUT_SCALE: f64 = 1.5;

/// Composite one intermediate frame between `from` and `to` at normalized
/// `progress` into `target`. The target is fully overwritten; nothing of
/// its prior contents survives. Progress outside [0,1] is clamped.
pub fn render_transition(
    target: &mut Surface,
    from: &Surface,
    to: &Surface,
    progress: f64,
    effect: TransitionEffect,
) -> ReelResult<()> {
    if !target.same_size(from) || !target.same_size(to) {
        return Err(ReelError::validation(
            "transition surfaces must share one set of dimensions",
        ));
    }

    let p = if progress.is_finite() {
        progress.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let w = f64::from(target.width());
    let h = f64::from(target.height());

    match effect {
        TransitionEffect::Fade => {
            target.mix_from(from, to, p as f32)?;
        }
        TransitionEffect::Crossfade => {
            target.mix_from(from, to, ease_in_out_cubic(p) as f32)?;
        }
        // The incoming offset is derived from the rounded outgoing one,
        // not rounded separately: the two slides must abut exactly or a
        // one-pixel background seam shows between them.
        TransitionEffect::SlideLeft => {
            target.fill([0, 0, 0, 255]);
            let x = offset(-w * p);
            target.blit(from, x, 0);
            target.blit(to, x + i64::from(target.width()), 0);
        }
        TransitionEffect::SlideRight => {
            target.fill([0, 0, 0, 255]);
            let x = offset(w * p);
            target.blit(from, x, 0);
            target.blit(to, x - i64::from(target.width()), 0);
        }
        TransitionEffect::SlideUp => {
            target.fill([0, 0, 0, 255]);
            let y = offset(-h * p);
            target.blit(from, 0, y);
            target.blit(to, 0, y + i64::from(target.height()));
        }
        TransitionEffect::SlideDown => {
            target.fill([0, 0, 0, 255]);
            let y = offset(h * p);
            target.blit(from, 0, y);
            target.blit(to, 0, y - i64::from(target.height()));
        }
        TransitionEffect::Zoom => {
            // Each draw carries its own transform and alpha, so nothing
            // leaks between the two or into later frames.
            target.fill([0, 0, 0, 255]);
            target.blit_scaled_center(from, 1.0 + (ZOOM_OUT_SCALE - 1.0) * p, (1.0 - p) as f32);
            target.blit_scaled_center(to, p, p as f32);
        }
        TransitionEffect::Cut => {
            target.copy_from(if p < 0.5 { from } else { to })?;
        }
    }

    Ok(())
}

/// Cubic ease-in-out warp used by crossfade for perceptually smoother
/// blending: `t<0.5 -> 4t^3; else 1-(-2t+2)^3/2`.
pub fn ease_in_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - ((-2.0 * t + 2.0).powi(3) / 2.0)
    }
}

fn offset(v: f64) -> i64 {
    v.round() as i64
}
