//! Implementation of the `time` library.
//!
//! `sleep` is a cooperating builtin: it naps in short slices and observes
//! the cancellation token and deadline between slices.

use std::{
    rc::Rc,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use crate::{
    exception::Exception,
    interp::Interp,
    value::{Builtin, Library, Value},
};

/// Sleep slice between cancellation checks.
const SLEEP_SLICE: Duration = Duration::from_millis(10);

pub(crate) fn build(_interp: &mut Interp) -> Result<Value, Exception> {
    let lib = Library::new("time", "Clock access and cooperative sleeping.");

    lib.set(
        "time",
        Value::Builtin(Rc::new(Builtin::new(
            "time",
            "Seconds since the Unix epoch, as a float.",
            |_interp, _args| {
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or(Duration::ZERO);
                Ok(Value::Float(now.as_secs_f64()))
            },
        ))),
    );

    lib.set(
        "monotonic",
        Value::Builtin(Rc::new(Builtin::new(
            "monotonic",
            "Monotonic clock reading in seconds.",
            {
                let origin = Instant::now();
                move |_interp: &mut Interp, _args| {
                    Ok(Value::Float(origin.elapsed().as_secs_f64()))
                }
            },
        ))),
    );

    lib.set(
        "sleep",
        Value::Builtin(Rc::new(Builtin::new(
            "sleep",
            "Sleep for the given seconds, honouring cancellation.",
            |interp, args| {
                let seconds = match args.require(0, "sleep")? {
                    Value::Int(i) => i as f64,
                    Value::Float(f) => f,
                    other => {
                        return Err(Exception::type_error(format!(
                            "sleep() argument must be a number, not '{}'",
                            other.type_name()
                        )));
                    }
                };
                if seconds < 0.0 {
                    return Err(Exception::value_error("sleep length must be non-negative"));
                }
                let until = Instant::now() + Duration::from_secs_f64(seconds);
                loop {
                    interp.limits.check_interrupt()?;
                    let now = Instant::now();
                    if now >= until {
                        return Ok(Value::None);
                    }
                    std::thread::sleep(SLEEP_SLICE.min(until - now));
                }
            },
        ))),
    );

    Ok(Value::Library(Rc::new(lib)))
}
