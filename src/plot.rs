//! Response Figures
//!
//! Renders a sampled oscillator trajectory as a plotly figure: displacement
//! and velocity against time, on one set of axes with a legend. Figure
//! construction is pure — callers decide whether to `show()` it in a
//! browser window or serialize it to HTML — so it can be exercised in tests
//! without a display.

use plotly::common::Mode;
use plotly::layout::{Axis, Layout};
use plotly::{Plot, Scatter};

use crate::oscillator::{POSITION, VELOCITY};
use crate::trajectory::Trajectory;

/// Build the response figure for a sampled [x, v] trajectory.
///
/// Two line traces over the same time axis: displacement x(t) and velocity
/// v(t), with a title, axis labels, and a legend.
pub fn response_figure(trajectory: &Trajectory<2>) -> Plot {
    let t = trajectory.times().to_vec();

    let displacement = Scatter::new(t.clone(), trajectory.component(POSITION))
        .mode(Mode::Lines)
        .name("displacement x(t)");
    let velocity = Scatter::new(t, trajectory.component(VELOCITY))
        .mode(Mode::Lines)
        .name("velocity v(t)");

    let mut plot = Plot::new();
    plot.add_trace(displacement);
    plot.add_trace(velocity);

    let layout = Layout::new()
        .title("Damped mass-spring oscillator response")
        .x_axis(Axis::new().title("time t [s]"))
        .y_axis(Axis::new().title("response"))
        .show_legend(true);
    plot.set_layout(layout);

    plot
}
