//! Damped mass-spring oscillator demo.
//!
//! Simulates m·x'' + c·x' + k·x = 0 for m = 1 kg, c = 0.2 N·s/m,
//! k = 1 N/m released from rest at x = 1 m, samples the response at 1000
//! points over ten seconds, and opens the displacement/velocity figure.
//!
//! Run with:
//!   cargo run

use spring_damper::{
    response_figure, Dopri5, DisplacementZero, EventAction, EventConfig, MassSpringDamper,
    TimeGrid, Tolerances,
};

fn main() {
    // Physical parameters
    let mass = 1.0; // kg
    let damping = 0.2; // N·s/m
    let stiffness = 1.0; // N/m
    let system =
        MassSpringDamper::new(mass, damping, stiffness).expect("demo parameters are valid");

    // Released from rest at unit displacement
    let y0 = [1.0, 0.0];

    // Sample the response at 1000 points over [0, 10] s
    let grid = TimeGrid::linspace(0.0, 10.0, 1000).expect("demo grid is valid");

    let mut solver = Dopri5::new(Tolerances::new(1e-10, 1e-10));
    let trajectory = solver
        .solve(&system, &y0, &grid)
        .expect("integration failed");

    println!("Damped Mass-Spring Oscillator");
    println!("  m = {mass} kg, c = {damping} N·s/m, k = {stiffness} N/m");
    println!(
        "  Regime: {} (ζ = {:.3})",
        system.regime(),
        system.damping_ratio()
    );
    println!("  ωn = {:.6} rad/s", system.natural_frequency());
    if let Some(omega_d) = system.damped_frequency() {
        println!("  ωd = {:.6} rad/s", omega_d);
    }
    println!();

    let (t_end, y_end) = trajectory.last().expect("trajectory is non-empty");
    println!("  x({t_end}) = {:.9} m", y_end[0]);
    println!("  v({t_end}) = {:.9} m/s", y_end[1]);
    println!(
        "  E(0) = {:.9} J, E({t_end}) = {:.9} J",
        system.energy(&y0),
        system.energy(y_end)
    );
    println!();

    // Locate every equilibrium crossing over the simulated interval
    let config = EventConfig {
        action: EventAction::Continue,
        ..Default::default()
    };
    let mut crossing_solver = Dopri5::new(Tolerances::new(1e-10, 1e-10));
    crossing_solver
        .integrate_to_event(
            &system,
            &DisplacementZero,
            &config,
            grid.start(),
            &y0,
            grid.end(),
            0.1,
        )
        .expect("crossing search failed");

    println!("  Equilibrium crossings:");
    for ev in &crossing_solver.collected_events {
        println!("    t = {:.6} s (v = {:+.6} m/s)", ev.t, ev.y[1]);
    }
    println!();

    println!("  Accepted steps: {}", trajectory.stats.accepted_steps);
    println!("  Rejected steps: {}", trajectory.stats.rejected_steps);
    println!("  Function evals: {}", trajectory.stats.fn_evals);

    // Opens the figure in the default browser; the process exits once the
    // page has been handed off
    response_figure(&trajectory).show();
}
