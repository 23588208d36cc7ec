use api_shared::{CreatePersonReq, CreateVisitReq, VisitRes};
use checkpost_core::{CheckpostService, CoreConfig, VisitId, constants::DEFAULT_PAGE_SIZE};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "checkpost")]
#[command(about = "Patient check-in and check-out CLI")]
struct Cli {
    /// Directory holding the record snapshot
    #[arg(long, env = "CHECKPOST_DATA_DIR", default_value = "checkpost_data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a service to the catalog
    AddService {
        /// Short service code, e.g. OPD
        code: String,
        /// Human-readable label
        label: String,
    },
    /// Register a person
    AddPerson {
        first_name: String,
        surname: String,
        #[arg(long, default_value_t = 0)]
        facility: i64,
        /// National identification number
        #[arg(long)]
        nin: Option<String>,
        #[arg(long)]
        hospital_number: Option<String>,
        /// Date of birth (YYYY-MM-DD)
        #[arg(long)]
        dob: Option<String>,
    },
    /// List the service catalog
    Services,
    /// Check a person in to one or more services
    CheckIn {
        person_id: i64,
        /// Service ids to route the visit to
        #[arg(required = true)]
        service_ids: Vec<i64>,
        /// Check-in time (YYYY-MM-DD HH:MM), default now
        #[arg(long)]
        at: Option<String>,
    },
    /// Check a visit out
    CheckOut { visit_id: i64 },
    /// Archive a visit
    Archive { visit_id: i64 },
    /// List non-archived visits
    Visits,
    /// Show one visit with its encounters
    Show { visit_id: i64 },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("Use 'checkpost --help' for commands");
        return Ok(());
    };

    let cfg = Arc::new(CoreConfig::new(Some(cli.data_dir), None, DEFAULT_PAGE_SIZE)?);
    let svc = CheckpostService::new(cfg)?;

    match command {
        Commands::AddService { code, label } => match svc.catalog().register(&code, &label) {
            Ok(service) => println!("Added service {} with ID: {}", service.code, service.id),
            Err(e) => eprintln!("Error adding service: {}", e),
        },
        Commands::AddPerson {
            first_name,
            surname,
            facility,
            nin,
            hospital_number,
            dob,
        } => {
            let req = CreatePersonReq {
                facility_id: facility,
                first_name,
                surname,
                nin,
                hospital_number,
                date_of_birth: dob,
                ..Default::default()
            };
            match svc.persons().register(req) {
                Ok(person) => println!("Registered person with ID: {}", person.id),
                Err(e) => eprintln!("Error registering person: {}", e),
            }
        }
        Commands::Services => {
            let services = svc.catalog().list()?;
            if services.is_empty() {
                println!("No services found.");
            }
            for service in services {
                println!("ID: {}, Code: {}, Label: {}", service.id, service.code, service.label);
            }
        }
        Commands::CheckIn {
            person_id,
            service_ids,
            at,
        } => {
            let req = CreateVisitReq {
                person_id,
                service_ids,
                check_in_date: at,
            };
            match svc.visits().create_visit(&req) {
                Ok(visit) => print_visit(&visit),
                Err(e) => eprintln!("Error checking in: {}", e),
            }
        }
        Commands::CheckOut { visit_id } => match svc.visits().check_out(VisitId(visit_id)) {
            Ok(()) => println!("Checked out visit: {}", visit_id),
            Err(e) => eprintln!("Error checking out: {}", e),
        },
        Commands::Archive { visit_id } => match svc.visits().archive_visit(VisitId(visit_id)) {
            Ok(()) => println!("Archived visit: {}", visit_id),
            Err(e) => eprintln!("Error archiving visit: {}", e),
        },
        Commands::Visits => {
            let visits = svc.visits().list_visits()?;
            if visits.is_empty() {
                println!("No visits found.");
            }
            for visit in &visits {
                print_visit(visit);
            }
        }
        Commands::Show { visit_id } => match svc.visits().get_visit(VisitId(visit_id)) {
            Ok(visit) => print_visit(&visit),
            Err(e) => eprintln!("Error reading visit: {}", e),
        },
    }

    Ok(())
}

fn print_visit(visit: &VisitRes) {
    println!(
        "Visit {} [{}] person {}, in {}, out {}",
        visit.id,
        visit.status,
        visit.person_id,
        visit.check_in_date,
        visit.check_out_date.as_deref().unwrap_or("-"),
    );
    for encounter in &visit.encounters {
        println!(
            "  encounter {} {} {}",
            encounter.id, encounter.service_code, encounter.status
        );
    }
}
