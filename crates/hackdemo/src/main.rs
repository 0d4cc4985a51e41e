mod run;

use anyhow::Result;

fn main() -> Result<()> {
    run::run()
}
