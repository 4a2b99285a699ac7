//! `runpack unseal`: Extract this executable's payload next to it.

use anyhow::Context;
use runpack::seal;

pub fn execute() -> anyhow::Result<i32> {
    if seal::unseal_next_to_executable().context("Failed to unseal")? {
        println!("Payload extracted.");
    } else {
        println!("No sealed payload found.");
    }
    Ok(0)
}
