use std::process::ExitCode;

fn main() -> ExitCode {
    let app = match xapi_example::app() {
        Ok(app) => app,
        Err(e) => {
            eprintln!("xmath: {}", e);
            return ExitCode::from(e.exit_code() as u8);
        }
    };

    // Failures print usage and exit inside run().
    match app.run() {
        Ok(xapi::Value::None) => ExitCode::SUCCESS,
        Ok(value) => match serde_json::to_string(&value) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("xmath: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => ExitCode::from(e.exit_code() as u8),
    }
}
