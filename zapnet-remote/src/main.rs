use std::net::{SocketAddr, ToSocketAddrs};
use std::process;
use std::time::Duration;

extern crate clap;
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};

use zapnet_remote::{init_logger, parse_u32, Error, RemoteClient};

fn socket_addr(host: &str, port: &str) -> Result<SocketAddr, String> {
    let port: u16 = port
        .parse()
        .map_err(|_| format!("bad port {:?}", port))?;
    (host, port)
        .to_socket_addrs()
        .map_err(|e| format!("cannot resolve {}: {}", host, e))?
        .next()
        .ok_or_else(|| format!("no address for {}", host))
}

fn numbers(matches: &ArgMatches, name: &str) -> Result<Vec<u32>, Error> {
    matches
        .values_of(name)
        .map(|values| values.map(parse_u32).collect())
        .unwrap_or_else(|| Ok(vec![]))
}

async fn run(app: ArgMatches<'_>) -> Result<(), String> {
    let remote = socket_addr(
        app.value_of("host").unwrap_or("10.0.11.2"),
        app.value_of("port").unwrap_or("1234"),
    )?;
    let local = socket_addr(
        app.value_of("bind").unwrap_or("0.0.0.0"),
        app.value_of("port").unwrap_or("1234"),
    )?;
    let timeout = app
        .value_of("timeout-ms")
        .map(|ms| ms.parse::<u64>().map_err(|_| format!("bad timeout {:?}", ms)))
        .transpose()?
        .map(Duration::from_millis);

    let mut client = RemoteClient::connect(local, remote)
        .await
        .map_err(|e| e.to_string())?;
    if let Some(timeout) = timeout {
        client = client.with_timeout(timeout);
    }

    match app.subcommand() {
        ("read", Some(read)) => {
            let addr = parse_u32(read.value_of("addr").unwrap_or_default()).map_err(|e| e.to_string())?;
            let count = read
                .value_of("count")
                .map(parse_u32)
                .transpose()
                .map_err(|e| e.to_string())?
                .unwrap_or(1);
            let addrs: Vec<u32> = (0..count).map(|i| addr.wrapping_add(4 * i)).collect();
            let values = client.read_many(&addrs).await.map_err(|e| e.to_string())?;
            for (addr, value) in addrs.iter().zip(values) {
                println!("{:#010x}: {:#010x}", addr, value);
            }
        }
        ("write", Some(write)) => {
            let addr = parse_u32(write.value_of("addr").unwrap_or_default()).map_err(|e| e.to_string())?;
            let values = numbers(write, "values").map_err(|e| e.to_string())?;
            client
                .write_burst(addr, &values)
                .await
                .map_err(|e| e.to_string())?;
        }
        _ => return Err("expected a read or write subcommand".to_string()),
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let app = App::new("zapnet-remote")
        .version("0.1.0")
        .about("Reads and writes instrument registers over Etherbone")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("host")
                .long("host")
                .value_name("HOST")
                .help("Device address")
                .default_value("10.0.11.2"),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("Etherbone UDP port, used on both ends")
                .default_value("1234"),
        )
        .arg(
            Arg::with_name("bind")
                .long("bind")
                .value_name("ADDR")
                .help("Local address to send from")
                .default_value("0.0.0.0"),
        )
        .arg(
            Arg::with_name("timeout-ms")
                .short("t")
                .long("timeout-ms")
                .value_name("MS")
                .help("How long to wait for each read reply"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .help("Log more; repeat for debug and trace output"),
        )
        .subcommand(
            SubCommand::with_name("read")
                .about("Reads consecutive words")
                .arg(Arg::with_name("addr").required(true).help("First address"))
                .arg(Arg::with_name("count").help("Number of words, default 1")),
        )
        .subcommand(
            SubCommand::with_name("write")
                .about("Writes consecutive words")
                .arg(Arg::with_name("addr").required(true).help("First address"))
                .arg(
                    Arg::with_name("values")
                        .required(true)
                        .multiple(true)
                        .help("Values to write"),
                ),
        )
        .get_matches();

    if let Err(e) = init_logger(app.occurrences_of("verbose")) {
        eprintln!("zapnet-remote: {}", e);
    }
    if let Err(e) = run(app).await {
        eprintln!("zapnet-remote: {}", e);
        process::exit(1);
    }
}
