use crate::commands::{finish, load_config, open_ledger, runtime, CommandResult, Failure};

pub fn run() -> CommandResult {
    let config = match load_config("migrate") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("migrate") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_ledger(&config).await?;
        pool.close().await;
        Ok::<String, Failure>("applied pending migrations".to_string())
    });

    finish("migrate", result)
}
