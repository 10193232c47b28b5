use crate::config::{ConsecutiveRules, WindowRule};
use crate::prelude::{ValidationError, ValidationResult};
use crate::record::LineId;
use crate::validate::findings::WindowFiring;

/// Rolling error counter for one window rule, scoped to one line.
#[derive(Debug, Clone)]
struct RollingWindow {
    rule: WindowRule,
    count: usize,
    /// First index not yet marked by an earlier firing.
    marked_until: usize,
    open: Option<WindowFiring>,
    firings: Vec<WindowFiring>,
}

impl RollingWindow {
    fn new(rule: WindowRule) -> Self {
        Self {
            rule,
            count: 0,
            marked_until: 0,
            open: None,
            firings: Vec::new(),
        }
    }
}

/// Result of one pass over a line's error sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowOutcome {
    /// Per position: inside a firing window and itself an error.
    pub marked: Vec<bool>,
    pub firings: Vec<WindowFiring>,
    pub error_count: usize,
}

/// Single forward pass over `errors` maintaining one counter per rule.
///
/// A rule fires at every full window holding at least `limit` errors; the
/// error positions inside a firing window are marked. Overlapping firings of
/// the same rule are reported as one span.
pub fn scan(
    line: &LineId,
    rules: &ConsecutiveRules,
    shot_points: &[i64],
    errors: &[bool],
) -> ValidationResult<WindowOutcome> {
    if shot_points.len() != errors.len() {
        return Err(ValidationError::WindowState {
            line: line.clone(),
            size: 0,
            detail: format!(
                "{} shot points but {} error entries",
                shot_points.len(),
                errors.len()
            ),
        });
    }
    let mut windows: Vec<RollingWindow> = Vec::with_capacity(rules.windows.len());
    for rule in &rules.windows {
        if rule.size == 0 || rule.limit == 0 {
            return Err(ValidationError::WindowState {
                line: line.clone(),
                size: rule.size,
                detail: format!("degenerate window rule {}/{}", rule.size, rule.limit),
            });
        }
        windows.push(RollingWindow::new(*rule));
    }

    let mut marked = vec![false; errors.len()];
    for (index, is_error) in errors.iter().enumerate() {
        for window in windows.iter_mut() {
            let size = window.rule.size;
            if *is_error {
                window.count += 1;
            }
            if index >= size && errors[index - size] {
                window.count = window.count.checked_sub(1).ok_or_else(|| {
                    ValidationError::WindowState {
                        line: line.clone(),
                        size,
                        detail: format!("counter underflow at position {}", index),
                    }
                })?;
            }
            if window.count > size {
                return Err(ValidationError::WindowState {
                    line: line.clone(),
                    size,
                    detail: format!("{} errors counted in a window of {}", window.count, size),
                });
            }

            let full = index + 1 >= size;
            if full && window.count >= window.rule.limit {
                let start = index + 1 - size;
                for slot in window.marked_until.max(start)..=index {
                    if errors[slot] {
                        marked[slot] = true;
                    }
                }
                window.marked_until = index + 1;

                match window.open.as_mut() {
                    Some(open) => {
                        open.last_shot = shot_points[index];
                        open.errors = window.count.max(open.errors);
                    }
                    None => {
                        window.open = Some(WindowFiring {
                            size,
                            limit: window.rule.limit,
                            first_shot: shot_points[start],
                            last_shot: shot_points[index],
                            errors: window.count,
                        });
                    }
                }
            } else if let Some(done) = window.open.take() {
                window.firings.push(done);
            }
        }
    }

    let mut firings = Vec::new();
    for mut window in windows {
        if let Some(done) = window.open.take() {
            window.firings.push(done);
        }
        firings.extend(window.firings);
    }
    Ok(WindowOutcome {
        marked,
        firings,
        error_count: errors.iter().filter(|is_error| **is_error).count(),
    })
}
