use std::time::Duration;

use powerprof::{Profiler, ProfilerConfiguration};
use powerprof::sim::{SimConnector, Simulator};

fn main() -> powerprof::Result<()> {
    env_logger::init();

    // 5 mA ± 2 mA at 1 kHz, sampled at 100 kS/s
    let connector = SimConnector::new(&["sim0"], |_| {
        Simulator::sine(5000, 2000, 100).with_samples_per_poll(10_000)
    });
    let profiler = Profiler::open(&connector, ProfilerConfiguration {
        settle_time: Duration::ZERO,
        ..Default::default()
    })?;
    profiler.enable_power()?;
    profiler.start_measuring()?;
    std::thread::sleep(Duration::from_secs(1));
    profiler.stop_measuring()?;

    let summary = profiler.summary()?;
    println!("samples:         {}", summary.sample_count);
    println!("duration:        {:.3} s", summary.duration_s);
    println!("current:         {:.3} mA (min {:.3}, max {:.3})",
        summary.average_current_ma,
        profiler.min_current_ma()?,
        profiler.max_current_ma()?);
    println!("power:           {:.3} mW", summary.average_power_mw);
    println!("energy:          {:.6} mWh", summary.average_energy_mwh);
    println!("charge:          {:.3} mC", summary.average_charge_mc);
    profiler.teardown();
    Ok(())
}
