use drspulse::app::Monitor;
use drspulse::logging;
use drspulse::settings::load_from_cli;
use std::io;
use std::thread;

fn main() -> io::Result<()> {
    let settings =
        load_from_cli().map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;

    let _logging = logging::init(&settings.output_dir).map_err(|err| io::Error::other(err.to_string()))?;

    let mut monitor = Monitor::new(&settings).map_err(|err| {
        tracing::error!("{err}");
        io::Error::new(io::ErrorKind::InvalidInput, err.to_string())
    })?;
    monitor
        .start()
        .map_err(|err| io::Error::other(err.to_string()))?;

    match settings.run_for {
        Some(duration) => {
            thread::sleep(duration);
            monitor
                .stop()
                .map_err(|err| io::Error::other(err.to_string()))?;
        }
        None => loop {
            thread::park();
        },
    }
    Ok(())
}
