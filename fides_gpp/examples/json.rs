use fides_gpp::cmpapi::{CmpApi, EventName, SignalStatus};
use std::env::args;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let s = args().nth(1).unwrap_or_else(|| {
        "DBACNYA~CPXxRfAPXxRfAAfKABENB-CgAAAAAAAAAAYgAAAAAAAA.ZAAgH9794ulA~1YNN".to_string()
    });

    let api = CmpApi::new(31, 1);
    api.add_event_listener(|api, event| {
        if event.event_name == EventName::SignalStatus {
            println!("{}", serde_json::to_string_pretty(&event.ping_data)?);
            println!("{}", serde_json::to_string_pretty(&api.context().gpp_model.to_json()?)?);
        }
        Ok(())
    });

    api.set_gpp_string(&s)?;
    api.set_signal_status(SignalStatus::Ready);
    Ok(())
}
