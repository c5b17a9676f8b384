use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use crate::application::{
    AppError, Dealership, ErrorKind, NewUser, ReconciliationReport, SaleRequest, require_role,
};
use crate::config::Settings;
use crate::domain::{
    Caller, DateRange, EntityType, ExpenseCategory, NewExpense, NewSparePart, NewTractor,
    PartDetails, PartUsage, Role, ServiceDraft, ServiceRecord, ServiceStatus, Tractor,
    TractorStatus, TractorType, Transaction, TransactionFilter, TransactionKind, format_cents,
    format_date, parse_cents, total_by_kind,
};

/// Dealerbook - tractor dealership inventory and ledger
#[derive(Parser)]
#[command(name = "dealerbook")]
#[command(about = "Inventory, service jobs and an append-only ledger for a tractor dealership")]
#[command(version)]
pub struct Cli {
    /// Database file path (overrides the configured one)
    #[arg(short, long, env = "DEALERBOOK_DATABASE", global = true)]
    pub database: Option<String>,

    /// Session token from `dealerbook login`
    #[arg(long, env = "DEALERBOOK_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database and create the admin account
    Init {
        /// Password for the initial `admin` user
        #[arg(long, env = "DEALERBOOK_ADMIN_PASSWORD", hide_env_values = true)]
        admin_password: String,
    },

    /// Sign in and print a session token
    Login {
        username: String,

        #[arg(long, env = "DEALERBOOK_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Show the signed-in user
    Whoami,

    /// User management (admin only)
    #[command(subcommand)]
    User(UserCommands),

    /// Tractor inventory and sales
    #[command(subcommand)]
    Tractor(TractorCommands),

    /// Spare parts stock
    #[command(subcommand)]
    Part(PartCommands),

    /// Workshop service jobs
    #[command(subcommand)]
    Service(ServiceCommands),

    /// Operating expenses
    #[command(subcommand)]
    Expense(ExpenseCommands),

    /// Financial reports
    #[command(subcommand)]
    Report(ReportCommands),

    /// Export the ledger as CSV or everything as JSON
    Export {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        #[arg(short, long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,

        #[command(flatten)]
        filter: LedgerFilterArgs,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create a user
    Create {
        username: String,

        #[arg(long)]
        password: String,

        #[arg(long, default_value = "")]
        full_name: String,

        /// admin or manager
        #[arg(long, default_value = "manager")]
        role: String,
    },

    /// List users
    List,
}

#[derive(clap::Args)]
pub struct TradeInArgs {
    /// Brand of the tractor taken in exchange
    #[arg(long = "trade-in-brand", requires_all = ["trade_in_model", "trade_in_chassis", "trade_in_price"])]
    pub trade_in_brand: Option<String>,

    #[arg(long = "trade-in-model", requires_all = ["trade_in_brand", "trade_in_chassis", "trade_in_price"])]
    pub trade_in_model: Option<String>,

    #[arg(long = "trade-in-chassis", requires_all = ["trade_in_brand", "trade_in_model", "trade_in_price"])]
    pub trade_in_chassis: Option<String>,

    /// Value credited to the customer for the trade-in
    #[arg(long = "trade-in-price", requires_all = ["trade_in_brand", "trade_in_model", "trade_in_chassis"])]
    pub trade_in_price: Option<String>,

    #[arg(long = "trade-in-year", requires = "trade_in_brand")]
    pub trade_in_year: Option<i32>,

    #[arg(long = "trade-in-engine", requires = "trade_in_brand")]
    pub trade_in_engine: Option<String>,
}

#[derive(Subcommand)]
pub enum TractorCommands {
    /// Receive a tractor into stock
    Add {
        brand: String,

        model: String,

        #[arg(long)]
        chassis: String,

        /// Purchase price (e.g. "10000" or "10000.00")
        #[arg(long)]
        price: String,

        #[arg(long, default_value_t = 0)]
        year: i32,

        /// new or used
        #[arg(short = 't', long = "type", default_value = "new")]
        tractor_type: String,

        #[arg(long, default_value = "")]
        engine: String,

        #[arg(long, default_value = "")]
        supplier: String,

        #[arg(long)]
        notes: Option<String>,
    },

    /// List tractors
    List {
        /// in_stock or sold
        #[arg(long)]
        status: Option<String>,
    },

    /// Show one tractor
    Show { id: i64 },

    /// Sell a tractor, optionally taking another in exchange
    Sell {
        id: i64,

        #[arg(long)]
        price: String,

        #[arg(long)]
        customer: String,

        #[command(flatten)]
        trade_in: TradeInArgs,
    },

    /// Change stored fields of a tractor
    Update {
        id: i64,

        #[arg(long)]
        brand: Option<String>,

        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        year: Option<i32>,

        #[arg(short = 't', long = "type")]
        tractor_type: Option<String>,

        #[arg(long)]
        chassis: Option<String>,

        #[arg(long)]
        engine: Option<String>,

        #[arg(long)]
        price: Option<String>,

        #[arg(long)]
        supplier: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Delete a tractor and unlink records that reference it
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum PartCommands {
    /// Add a spare part to the catalogue
    Add {
        name: String,

        #[arg(long)]
        number: String,

        /// Unit price
        #[arg(long)]
        price: String,

        #[arg(long, default_value_t = 0)]
        stock: i64,

        #[arg(long, default_value_t = 5)]
        min_stock: i64,

        #[arg(long)]
        category: Option<String>,
    },

    /// List parts
    List {
        /// Only parts at or below their minimum stock
        #[arg(long)]
        low_stock: bool,
    },

    /// Show one part
    Show { id: i64 },

    /// Sell parts over the counter
    Sell {
        id: i64,

        #[arg(short, long)]
        quantity: i64,

        #[arg(long)]
        customer: String,
    },

    /// Add to (or with a negative value, remove from) stock
    Adjust {
        id: i64,

        #[arg(allow_negative_numbers = true)]
        delta: i64,
    },

    /// Change descriptive fields; stock is only changed by `adjust`
    Update {
        id: i64,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        number: Option<String>,

        #[arg(long)]
        price: Option<String>,

        #[arg(long)]
        min_stock: Option<i64>,

        #[arg(long)]
        category: Option<String>,
    },

    /// Remove a part from the catalogue
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum ServiceCommands {
    /// Record a completed service job
    Add {
        #[arg(long)]
        customer: String,

        #[arg(long)]
        description: String,

        /// Labor charge
        #[arg(long, default_value = "0")]
        labor: String,

        /// Parts charge, used only when no priced parts are listed
        #[arg(long, default_value = "0")]
        parts_cost: String,

        #[arg(long)]
        tractor: Option<i64>,

        /// Part consumed, as PART_ID:QUANTITY[:UNIT_PRICE]; repeatable
        #[arg(long = "part")]
        parts: Vec<String>,

        /// Service date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// List service jobs
    List {
        #[command(flatten)]
        range: DateRangeArgs,
    },

    /// Show one service job
    Show { id: i64 },

    /// Change a service job; stock is not adjusted
    Update {
        id: i64,

        #[arg(long)]
        customer: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        labor: Option<String>,

        #[arg(long)]
        parts_cost: Option<String>,

        #[arg(long)]
        tractor: Option<i64>,

        /// Replacement parts list, as PART_ID:QUANTITY[:UNIT_PRICE]
        #[arg(long = "part")]
        parts: Vec<String>,

        #[arg(long)]
        date: Option<String>,

        /// pending or completed
        #[arg(long)]
        status: Option<String>,
    },

    /// Delete a service job
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum ExpenseCommands {
    /// Record an expense
    Add {
        /// salary, rent, bill or misc
        category: String,

        amount: String,

        #[arg(long, default_value = "")]
        description: String,

        #[arg(long)]
        recipient: Option<String>,

        #[arg(long)]
        date: Option<String>,
    },

    /// List expenses
    List {
        #[arg(long)]
        category: Option<String>,

        #[command(flatten)]
        range: DateRangeArgs,
    },

    /// Totals per category
    Summary {
        #[command(flatten)]
        range: DateRangeArgs,
    },

    /// Show one expense
    Show { id: i64 },

    /// Replace an expense
    Update {
        id: i64,

        category: String,

        amount: String,

        #[arg(long, default_value = "")]
        description: String,

        #[arg(long)]
        recipient: Option<String>,

        #[arg(long)]
        date: Option<String>,
    },

    /// Delete an expense
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Sales, purchases, expenses and profit (admin only)
    ProfitLoss {
        #[command(flatten)]
        range: DateRangeArgs,
    },

    /// Ledger entries
    Transactions {
        #[command(flatten)]
        filter: LedgerFilterArgs,
    },

    /// Check the ledger against inventory and service records
    Reconcile,

    /// Stock levels, recent expenses and all-time totals
    Dashboard,
}

#[derive(clap::Args, Default)]
pub struct DateRangeArgs {
    /// Start date, inclusive (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<String>,

    /// End date, inclusive (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<String>,
}

#[derive(clap::Args, Default)]
pub struct LedgerFilterArgs {
    /// sale or purchase
    #[arg(long = "type")]
    pub kind: Option<String>,

    /// tractor, part or service
    #[arg(long)]
    pub entity: Option<String>,

    #[command(flatten)]
    pub range: DateRangeArgs,
}

impl Cli {
    pub async fn run(self, settings: Settings) -> Result<()> {
        let settings = match &self.database {
            Some(path) => settings.with_database_path(path),
            None => settings,
        };

        if let Commands::Init { admin_password } = &self.command {
            let dealership = Dealership::init(&settings).await?;
            let admin = dealership.auth.bootstrap_admin(admin_password).await?;
            println!("Database initialized: {}", settings.database.path);
            if let Some(admin) = admin {
                println!("Created admin user: {}", admin.username);
            }
            dealership.close().await;
            return Ok(());
        }

        let dealership = Dealership::connect(&settings).await?;
        let result = self.dispatch(&dealership).await;
        dealership.close().await;
        result
    }

    async fn dispatch(self, dealership: &Dealership) -> Result<()> {
        if let Commands::Login { username, password } = &self.command {
            let login = dealership.auth.login(username, password).await?;
            println!("{}", login.token);
            eprintln!(
                "Logged in as {} ({}), token valid until {}",
                login.user.username,
                login.user.role,
                login.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            return Ok(());
        }

        let caller = self.authenticate(dealership)?;
        tracing::debug!(username = %caller.username, role = %caller.role, "authenticated");

        match self.command {
            Commands::Init { .. } | Commands::Login { .. } => Ok(()),
            Commands::Whoami => {
                let user = dealership.auth.current_user(&caller).await?;
                println!("{} ({})", user.username, user.role);
                if !user.full_name.is_empty() {
                    println!("  Name:    {}", user.full_name);
                }
                println!("  Since:   {}", user.created_at.format("%Y-%m-%d"));
                Ok(())
            }
            Commands::User(cmd) => run_user_command(dealership, &caller, cmd).await,
            Commands::Tractor(cmd) => run_tractor_command(dealership, cmd).await,
            Commands::Part(cmd) => run_part_command(dealership, cmd).await,
            Commands::Service(cmd) => run_service_command(dealership, cmd).await,
            Commands::Expense(cmd) => run_expense_command(dealership, &caller, cmd).await,
            Commands::Report(cmd) => run_report_command(dealership, &caller, cmd).await,
            Commands::Export {
                output,
                format,
                filter,
            } => run_export_command(dealership, output.as_deref(), format, filter).await,
        }
    }

    fn authenticate(&self, dealership: &Dealership) -> Result<Caller> {
        let token = self
            .token
            .as_deref()
            .ok_or(AppError::AuthenticationFailed)
            .context("No session token; run `dealerbook login` and set DEALERBOOK_TOKEN")?;
        Ok(dealership.auth.validate_token(token)?)
    }
}

/// Process exit code for a failed command, by error kind.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<AppError>().map(AppError::kind) {
        Some(ErrorKind::Validation) => 2,
        Some(ErrorKind::NotFound) => 3,
        Some(ErrorKind::Conflict) => 4,
        Some(ErrorKind::Unauthorized) => 5,
        Some(ErrorKind::Persistence) => 6,
        None => 1,
    }
}

async fn run_user_command(dealership: &Dealership, caller: &Caller, cmd: UserCommands) -> Result<()> {
    require_role(caller, Role::Admin)?;

    match cmd {
        UserCommands::Create {
            username,
            password,
            full_name,
            role,
        } => {
            let role = Role::from_str(&role)
                .ok_or_else(|| AppError::validation(format!("Invalid role '{role}'. Valid roles: admin, manager")))?;
            let user = dealership
                .auth
                .create_user(NewUser {
                    username,
                    password,
                    full_name,
                    role,
                })
                .await?;
            println!("Created user: {} ({})", user.username, user.role);
        }

        UserCommands::List => {
            let users = dealership.auth.list_users().await?;
            println!("{:<6} {:<16} {:<8} {:<24}", "ID", "USERNAME", "ROLE", "NAME");
            println!("{}", "-".repeat(57));
            for user in users {
                println!(
                    "{:<6} {:<16} {:<8} {:<24}",
                    user.id, user.username, user.role, user.full_name
                );
            }
        }
    }
    Ok(())
}

async fn run_tractor_command(dealership: &Dealership, cmd: TractorCommands) -> Result<()> {
    let tractors = &dealership.tractors;

    match cmd {
        TractorCommands::Add {
            brand,
            model,
            chassis,
            price,
            year,
            tractor_type,
            engine,
            supplier,
            notes,
        } => {
            let mut new_tractor = NewTractor::new(brand, model, chassis, parse_money(&price)?)
                .with_year(year)
                .with_type(parse_tractor_type(&tractor_type)?)
                .with_engine_number(engine)
                .with_supplier(supplier);
            if let Some(notes) = notes {
                new_tractor = new_tractor.with_notes(notes);
            }

            let tractor = tractors.intake(new_tractor).await?;
            println!(
                "Received tractor #{}: {} ({}) for {}",
                tractor.id,
                tractor.label(),
                tractor.chassis_number,
                format_cents(tractor.purchase_price)
            );
        }

        TractorCommands::List { status } => {
            let status = status
                .map(|s| {
                    TractorStatus::from_str(&s)
                        .ok_or_else(|| AppError::validation(format!("Invalid status '{s}'. Valid: in_stock, sold")))
                })
                .transpose()?;

            let list = tractors.list(status).await?;
            if list.is_empty() {
                println!("No tractors found.");
                return Ok(());
            }

            println!(
                "{:<6} {:<24} {:<16} {:<9} {:>12} {:>12}",
                "ID", "TRACTOR", "CHASSIS", "STATUS", "PURCHASE", "SALE"
            );
            println!("{}", "-".repeat(84));
            for tractor in list {
                println!(
                    "{:<6} {:<24} {:<16} {:<9} {:>12} {:>12}",
                    tractor.id,
                    truncate(&tractor.label(), 24),
                    truncate(&tractor.chassis_number, 16),
                    tractor.status,
                    format_cents(tractor.purchase_price),
                    tractor.sale_price.map(format_cents).unwrap_or_default()
                );
            }
        }

        TractorCommands::Show { id } => {
            let tractor = tractors.get(id).await?;
            print_tractor(&tractor);
            let history = dealership
                .accounting
                .entity_history(EntityType::Tractor, id)
                .await?;
            print_history(&history);
        }

        TractorCommands::Sell {
            id,
            price,
            customer,
            trade_in,
        } => {
            let mut request = SaleRequest::new(parse_money(&price)?, customer);
            if let Some(trade_in) = trade_in.into_new_tractor()? {
                request = request.with_trade_in(trade_in);
            }

            let outcome = tractors.sell(id, request).await?;
            println!("{}", outcome.message);
            println!("  Tractor:     #{} {}", outcome.tractor.id, outcome.tractor.label());
            println!(
                "  Sale price:  {}",
                outcome.tractor.sale_price.map(format_cents).unwrap_or_default()
            );
            if let Some(trade_in) = &outcome.trade_in {
                println!(
                    "  Trade-in:    #{} {} ({})",
                    trade_in.id,
                    trade_in.label(),
                    format_cents(trade_in.purchase_price)
                );
            }
            println!("  Profit/loss: {}", format_cents(outcome.profit_loss));
        }

        TractorCommands::Update {
            id,
            brand,
            model,
            year,
            tractor_type,
            chassis,
            engine,
            price,
            supplier,
            notes,
        } => {
            let mut tractor = tractors.get(id).await?;
            if let Some(brand) = brand {
                tractor.brand = brand;
            }
            if let Some(model) = model {
                tractor.model = model;
            }
            if let Some(year) = year {
                tractor.year = year;
            }
            if let Some(tractor_type) = tractor_type {
                tractor.tractor_type = parse_tractor_type(&tractor_type)?;
            }
            if let Some(chassis) = chassis {
                tractor.chassis_number = chassis;
            }
            if let Some(engine) = engine {
                tractor.engine_number = engine;
            }
            if let Some(price) = price {
                tractor.purchase_price = parse_money(&price)?;
            }
            if let Some(supplier) = supplier {
                tractor.supplier_name = supplier;
            }
            if notes.is_some() {
                tractor.notes = notes;
            }

            let tractor = tractors.update(tractor).await?;
            println!("Updated tractor #{}: {}", tractor.id, tractor.label());
        }

        TractorCommands::Delete { id } => {
            tractors.delete(id).await?;
            println!("Deleted tractor #{id}");
        }
    }
    Ok(())
}

impl TradeInArgs {
    /// `None` when no trade-in was given. A partial trade-in is an error,
    /// never a plain sale.
    fn into_new_tractor(self) -> Result<Option<NewTractor>> {
        let (brand, model, chassis, price) = match (
            self.trade_in_brand,
            self.trade_in_model,
            self.trade_in_chassis,
            self.trade_in_price,
        ) {
            (Some(brand), Some(model), Some(chassis), Some(price)) => (brand, model, chassis, price),
            (None, None, None, None) if self.trade_in_year.is_none() && self.trade_in_engine.is_none() => {
                return Ok(None);
            }
            _ => {
                return Err(AppError::validation(
                    "A trade-in needs brand, model, chassis number and price",
                )
                .into());
            }
        };

        let mut trade_in = NewTractor::new(brand, model, chassis, parse_money(&price)?)
            .with_type(TractorType::Used);
        if let Some(year) = self.trade_in_year {
            trade_in = trade_in.with_year(year);
        }
        if let Some(engine) = self.trade_in_engine {
            trade_in = trade_in.with_engine_number(engine);
        }
        Ok(Some(trade_in))
    }
}

fn print_tractor(tractor: &Tractor) {
    println!("Tractor #{}: {}", tractor.id, tractor.label());
    println!("  Year:        {}", tractor.year);
    println!("  Type:        {}", tractor.tractor_type);
    println!("  Chassis:     {}", tractor.chassis_number);
    if !tractor.engine_number.is_empty() {
        println!("  Engine:      {}", tractor.engine_number);
    }
    println!("  Status:      {}", tractor.status);
    println!(
        "  Purchased:   {} from {} for {}",
        format_date(tractor.purchase_date),
        if tractor.supplier_name.is_empty() { "-" } else { &tractor.supplier_name },
        format_cents(tractor.purchase_price)
    );
    if tractor.is_sold() {
        println!(
            "  Sold:        {} to {} for {}",
            tractor.sale_date.map(format_date).unwrap_or_default(),
            tractor.customer_name.as_deref().unwrap_or("-"),
            tractor.sale_price.map(format_cents).unwrap_or_default()
        );
    }
    if let Some(exchange_id) = tractor.exchange_tractor_id {
        println!("  Trade-in:    #{exchange_id}");
    }
    if let Some(notes) = &tractor.notes {
        println!("  Notes:       {notes}");
    }
}

fn print_history(entries: &[Transaction]) {
    if entries.is_empty() {
        return;
    }
    println!("  Ledger:");
    for entry in entries {
        println!(
            "    #{:<5} {} {:<8} {:>12}  {}",
            entry.id,
            format_date(entry.date),
            entry.kind,
            format_cents(entry.amount),
            entry.description
        );
    }
}

async fn run_part_command(dealership: &Dealership, cmd: PartCommands) -> Result<()> {
    let parts = &dealership.parts;

    match cmd {
        PartCommands::Add {
            name,
            number,
            price,
            stock,
            min_stock,
            category,
        } => {
            let mut new_part = NewSparePart::new(name, number, parse_money(&price)?)
                .with_stock(stock)
                .with_min_stock(min_stock);
            if let Some(category) = category {
                new_part = new_part.with_category(category);
            }

            let part = parts.intake(new_part).await?;
            println!(
                "Added part #{}: {} ({}), stock {}",
                part.id, part.name, part.part_number, part.stock_quantity
            );
        }

        PartCommands::List { low_stock } => {
            let list = if low_stock {
                parts.low_stock().await?
            } else {
                parts.list().await?
            };
            if list.is_empty() {
                println!("No parts found.");
                return Ok(());
            }

            println!(
                "{:<6} {:<24} {:<14} {:>7} {:>7} {:>10}",
                "ID", "NAME", "NUMBER", "STOCK", "MIN", "PRICE"
            );
            println!("{}", "-".repeat(73));
            for part in list {
                println!(
                    "{:<6} {:<24} {:<14} {:>7} {:>7} {:>10}{}",
                    part.id,
                    truncate(&part.name, 24),
                    truncate(&part.part_number, 14),
                    part.stock_quantity,
                    part.min_stock,
                    format_cents(part.unit_price),
                    if part.is_low_stock() { "  LOW" } else { "" }
                );
            }
        }

        PartCommands::Show { id } => {
            let part = parts.get(id).await?;
            println!("Part #{}: {}", part.id, part.name);
            println!("  Number:     {}", part.part_number);
            if let Some(category) = &part.category {
                println!("  Category:   {category}");
            }
            println!("  Unit price: {}", format_cents(part.unit_price));
            println!("  Stock:      {} (minimum {})", part.stock_quantity, part.min_stock);
            println!("  Updated:    {}", part.updated_at.format("%Y-%m-%d %H:%M:%S"));
        }

        PartCommands::Sell {
            id,
            quantity,
            customer,
        } => {
            let sale = parts.sell(id, quantity, &customer).await?;
            println!(
                "Sold {} x {} to {} for {} ({} left)",
                sale.quantity,
                sale.part.name,
                customer,
                format_cents(sale.transaction.amount),
                sale.part.stock_quantity
            );
        }

        PartCommands::Adjust { id, delta } => {
            let part = parts.adjust_stock(id, delta).await?;
            println!("Stock of {} is now {}", part.name, part.stock_quantity);
        }

        PartCommands::Update {
            id,
            name,
            number,
            price,
            min_stock,
            category,
        } => {
            let part = parts.get(id).await?;
            let details = PartDetails {
                name: name.unwrap_or(part.name),
                part_number: number.unwrap_or(part.part_number),
                category: category.or(part.category),
                unit_price: match price {
                    Some(price) => parse_money(&price)?,
                    None => part.unit_price,
                },
                min_stock: min_stock.unwrap_or(part.min_stock),
            };

            let part = parts.update(id, details).await?;
            println!("Updated part #{}: {}", part.id, part.name);
        }

        PartCommands::Delete { id } => {
            parts.delete(id).await?;
            println!("Deleted part #{id}");
        }
    }
    Ok(())
}

async fn run_service_command(dealership: &Dealership, cmd: ServiceCommands) -> Result<()> {
    let services = &dealership.services;

    match cmd {
        ServiceCommands::Add {
            customer,
            description,
            labor,
            parts_cost,
            tractor,
            parts,
            date,
        } => {
            let mut draft = ServiceDraft::new(customer, description, parse_money(&labor)?)
                .with_parts_cost(parse_money(&parts_cost)?);
            if let Some(tractor_id) = tractor {
                draft = draft.with_tractor(tractor_id);
            }
            if let Some(date) = date {
                draft = draft.with_date(parse_day(&date)?);
            }
            for raw in &parts {
                draft = draft.with_part(parse_part_usage(dealership, raw).await?);
            }

            let record = services.create(draft).await?;
            println!(
                "Recorded service #{} for {}: total {}",
                record.id,
                record.customer_name,
                format_cents(record.total_cost)
            );
        }

        ServiceCommands::List { range } => {
            let list = services.list(range.into_range()?).await?;
            if list.is_empty() {
                println!("No service jobs found.");
                return Ok(());
            }

            println!(
                "{:<6} {:<10} {:<20} {:<28} {:>12} {:<9}",
                "ID", "DATE", "CUSTOMER", "DESCRIPTION", "TOTAL", "STATUS"
            );
            println!("{}", "-".repeat(90));
            for record in list {
                println!(
                    "{:<6} {:<10} {:<20} {:<28} {:>12} {:<9}",
                    record.id,
                    format_date(record.service_date),
                    truncate(&record.customer_name, 20),
                    truncate(&record.description, 28),
                    format_cents(record.total_cost),
                    record.status
                );
            }
        }

        ServiceCommands::Show { id } => {
            let record = services.get(id).await?;
            print_service(&record);
            let history = dealership
                .accounting
                .entity_history(EntityType::Service, id)
                .await?;
            print_history(&history);
        }

        ServiceCommands::Update {
            id,
            customer,
            description,
            labor,
            parts_cost,
            tractor,
            parts,
            date,
            status,
        } => {
            let existing = services.get(id).await?;

            let parts_used = if parts.is_empty() {
                existing.parts_used
            } else {
                let mut usages = Vec::with_capacity(parts.len());
                for raw in &parts {
                    usages.push(parse_part_usage(dealership, raw).await?);
                }
                usages
            };
            let status = status
                .map(|s| {
                    ServiceStatus::from_str(&s)
                        .ok_or_else(|| AppError::validation(format!("Invalid status '{s}'. Valid: pending, completed")))
                })
                .transpose()?;

            let draft = ServiceDraft {
                tractor_id: tractor.or(existing.tractor_id),
                customer_name: customer.unwrap_or(existing.customer_name),
                description: description.unwrap_or(existing.description),
                labor_cost: match labor {
                    Some(labor) => parse_money(&labor)?,
                    None => existing.labor_cost,
                },
                parts_cost: match parts_cost {
                    Some(parts_cost) => parse_money(&parts_cost)?,
                    None => existing.parts_cost,
                },
                parts_used,
                service_date: date.map(|d| parse_day(&d)).transpose()?,
                status,
            };

            let record = services.update(id, draft).await?;
            println!(
                "Updated service #{}: total {}",
                record.id,
                format_cents(record.total_cost)
            );
        }

        ServiceCommands::Delete { id } => {
            services.delete(id).await?;
            println!("Deleted service #{id}");
        }
    }
    Ok(())
}

fn print_service(record: &ServiceRecord) {
    println!("Service #{}: {}", record.id, record.description);
    println!("  Customer:   {}", record.customer_name);
    if let Some(tractor_id) = record.tractor_id {
        println!("  Tractor:    #{tractor_id}");
    }
    println!("  Date:       {}", format_date(record.service_date));
    println!("  Status:     {}", record.status);
    if !record.parts_used.is_empty() {
        println!("  Parts:");
        for usage in &record.parts_used {
            println!(
                "    {} x {} @ {}",
                usage.quantity,
                usage.display_name(),
                format_cents(usage.unit_price)
            );
        }
    }
    println!("  Labor:      {:>12}", format_cents(record.labor_cost));
    println!("  Parts:      {:>12}", format_cents(record.parts_cost));
    println!("  Total:      {:>12}", format_cents(record.total_cost));
}

/// Parse `PART_ID:QUANTITY[:UNIT_PRICE]`. Without a price the catalogue price
/// of the part is used.
async fn parse_part_usage(dealership: &Dealership, raw: &str) -> Result<PartUsage> {
    let mut fields = raw.split(':');
    let (Some(id), Some(quantity)) = (fields.next(), fields.next()) else {
        anyhow::bail!("Invalid part '{raw}'. Use PART_ID:QUANTITY[:UNIT_PRICE]");
    };
    let part_id: i64 = id
        .trim()
        .parse()
        .with_context(|| format!("Invalid part id in '{raw}'"))?;
    let quantity: i64 = quantity
        .trim()
        .parse()
        .with_context(|| format!("Invalid quantity in '{raw}'"))?;

    let part = dealership.parts.get(part_id).await?;
    let unit_price = match fields.next() {
        Some(price) => parse_money(price)?,
        None => part.unit_price,
    };

    Ok(PartUsage::new(part_id, part.name, quantity, unit_price))
}

async fn run_expense_command(dealership: &Dealership, caller: &Caller, cmd: ExpenseCommands) -> Result<()> {
    let accounting = &dealership.accounting;

    match cmd {
        ExpenseCommands::Add {
            category,
            amount,
            description,
            recipient,
            date,
        } => {
            let expense = build_expense(&category, &amount, description, recipient, date)?;
            let expense = accounting.create_expense(expense, caller).await?;
            println!(
                "Recorded expense #{}: {} {} on {}",
                expense.id,
                expense.category,
                format_cents(expense.amount),
                format_date(expense.date)
            );
        }

        ExpenseCommands::List { category, range } => {
            let category = category.map(|c| parse_category(&c)).transpose()?;
            let list = accounting.list_expenses(category, range.into_range()?).await?;
            if list.is_empty() {
                println!("No expenses found.");
                return Ok(());
            }

            println!(
                "{:<6} {:<10} {:<8} {:>12} {:<20} {:<24}",
                "ID", "DATE", "CATEGORY", "AMOUNT", "RECIPIENT", "DESCRIPTION"
            );
            println!("{}", "-".repeat(85));
            for expense in list {
                println!(
                    "{:<6} {:<10} {:<8} {:>12} {:<20} {:<24}",
                    expense.id,
                    format_date(expense.date),
                    expense.category,
                    format_cents(expense.amount),
                    truncate(expense.recipient.as_deref().unwrap_or(""), 20),
                    truncate(&expense.description, 24)
                );
            }
        }

        ExpenseCommands::Summary { range } => {
            let summary = accounting.expense_summary(range.into_range()?).await?;
            println!("Expenses {}", describe_range(&summary.range));
            println!();
            for line in &summary.categories {
                println!("  {:<10} {:>12}", format!("{}:", line.category), format_cents(line.total));
            }
            println!("  {}", "-".repeat(23));
            println!("  {:<10} {:>12}", "Total:", format_cents(summary.total));
        }

        ExpenseCommands::Show { id } => {
            let expense = accounting.get_expense(id).await?;
            println!("Expense #{}", expense.id);
            println!("  Category:   {}", expense.category);
            println!("  Amount:     {}", format_cents(expense.amount));
            println!("  Date:       {}", format_date(expense.date));
            if let Some(recipient) = &expense.recipient {
                println!("  Recipient:  {recipient}");
            }
            if !expense.description.is_empty() {
                println!("  Notes:      {}", expense.description);
            }
            println!("  Entered by: user #{}", expense.created_by);
        }

        ExpenseCommands::Update {
            id,
            category,
            amount,
            description,
            recipient,
            date,
        } => {
            let changes = build_expense(&category, &amount, description, recipient, date)?;
            let expense = accounting.update_expense(id, changes).await?;
            println!("Updated expense #{}: {}", expense.id, format_cents(expense.amount));
        }

        ExpenseCommands::Delete { id } => {
            accounting.delete_expense(id).await?;
            println!("Deleted expense #{id}");
        }
    }
    Ok(())
}

fn build_expense(
    category: &str,
    amount: &str,
    description: String,
    recipient: Option<String>,
    date: Option<String>,
) -> Result<NewExpense> {
    let mut expense = NewExpense::new(parse_category(category)?, parse_money(amount)?, description);
    if let Some(recipient) = recipient {
        expense = expense.with_recipient(recipient);
    }
    if let Some(date) = date {
        expense = expense.on(parse_day(&date)?);
    }
    Ok(expense)
}

async fn run_report_command(dealership: &Dealership, caller: &Caller, cmd: ReportCommands) -> Result<()> {
    let accounting = &dealership.accounting;

    match cmd {
        ReportCommands::ProfitLoss { range } => {
            require_role(caller, Role::Admin)?;

            let range = range.into_range()?;
            let report = accounting.profit_loss(range).await?;

            println!("Profit & loss {}", describe_range(&range));
            println!();
            println!("  {:<16} {:>14}", "Sales:", format_cents(report.total_sales));
            println!("  {:<16} {:>14}", "Purchases:", format_cents(report.total_purchases));
            println!("  {:<16} {:>14}", "Gross profit:", format_cents(report.gross_profit));
            println!("  {:<16} {:>14}", "Expenses:", format_cents(report.total_expenses));
            println!("  {}", "-".repeat(31));
            println!("  {:<16} {:>14}", "Net profit:", format_cents(report.net_profit));
        }

        ReportCommands::Transactions { filter } => {
            let filter = filter.into_filter()?;
            let entries = accounting.transactions(filter).await?;
            if entries.is_empty() {
                println!("No transactions found.");
                return Ok(());
            }

            println!(
                "{:<6} {:<10} {:<8} {:<12} {:>12} {:<20} {:<28}",
                "ID", "DATE", "TYPE", "ENTITY", "AMOUNT", "PARTY", "DESCRIPTION"
            );
            println!("{}", "-".repeat(102));
            for entry in &entries {
                println!(
                    "{:<6} {:<10} {:<8} {:<12} {:>12} {:<20} {:<28}",
                    entry.id,
                    format_date(entry.date),
                    entry.kind,
                    format!("{} #{}", entry.entity_type, entry.entity_id),
                    format_cents(entry.amount),
                    truncate(&entry.party_name, 20),
                    truncate(&entry.description, 28)
                );
            }
            println!();
            println!(
                "Sales: {}  Purchases: {}",
                format_cents(total_by_kind(&entries, TransactionKind::Sale, filter.range)),
                format_cents(total_by_kind(&entries, TransactionKind::Purchase, filter.range))
            );
        }

        ReportCommands::Dashboard => {
            let dashboard = accounting.dashboard().await?;

            println!("Dashboard");
            println!();
            println!("  {:<18} {:>12}", "Tractors in stock:", dashboard.tractors_in_stock);
            println!("  {:<18} {:>12}", "Low stock parts:", dashboard.low_stock_parts);
            println!("  {:<18} {:>12}", "Total sales:", format_cents(dashboard.total_sales));
            println!("  {:<18} {:>12}", "Total expenses:", format_cents(dashboard.total_expenses));

            if !dashboard.recent_expenses.is_empty() {
                println!();
                println!("Recent expenses:");
                for expense in &dashboard.recent_expenses {
                    println!(
                        "  {:<10} {:<8} {:>12} {}",
                        format_date(expense.date),
                        expense.category,
                        format_cents(expense.amount),
                        truncate(&expense.description, 32)
                    );
                }
            }
        }

        ReportCommands::Reconcile => {
            println!("Reconciling ledger...\n");
            let report = accounting.reconcile().await?;
            print_reconciliation(&report);
            if !report.is_clean() {
                anyhow::bail!("Ledger reconciliation failed");
            }
        }
    }
    Ok(())
}

fn print_reconciliation(report: &ReconciliationReport) {
    let stats = &report.stats;
    println!("  {:<34} {:>6}", "Tractors without purchase entry:", stats.tractors_without_purchase);
    println!("  {:<34} {:>6}", "Sold tractors without sale entry:", stats.sold_tractors_without_sale);
    println!("  {:<34} {:>6}", "Service jobs without sale entry:", stats.services_without_sale);
    println!("  {:<34} {:>6}", "Negative ledger amounts:", stats.negative_entries);
    println!("  {:<34} {:>6}", "Dangling trade-in links:", stats.dangling_exchange_links);
    println!();

    if report.is_clean() {
        println!("Ledger is consistent.");
    } else {
        println!("Issues found:");
        for issue in &report.issues {
            println!("  - {issue}");
        }
    }
}

async fn run_export_command(
    dealership: &Dealership,
    output: Option<&str>,
    format: ExportFormat,
    filter: LedgerFilterArgs,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{Write, stdout};

    let exporter = Exporter::new(dealership);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("Failed to create {path}"))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match format {
        ExportFormat::Csv => {
            let count = exporter.export_ledger_csv(filter.into_filter()?, writer).await?;
            if output.is_some() {
                eprintln!("Exported {count} ledger entries");
            }
        }
        ExportFormat::Json => {
            let snapshot = exporter.export_full_json(writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported {} tractors, {} parts, {} service jobs, {} expenses, {} ledger entries",
                    snapshot.tractors.len(),
                    snapshot.spare_parts.len(),
                    snapshot.service_records.len(),
                    snapshot.expenses.len(),
                    snapshot.transactions.len()
                );
            }
        }
    }
    Ok(())
}

impl DateRangeArgs {
    fn into_range(self) -> Result<DateRange> {
        let start = self.from.as_deref().map(parse_day).transpose()?;
        let end = self.to.as_deref().map(parse_day).transpose()?;
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(AppError::validation("--from must not be after --to").into());
            }
        }
        Ok(DateRange::new(start, end))
    }
}

impl LedgerFilterArgs {
    fn into_filter(self) -> Result<TransactionFilter> {
        let kind = self
            .kind
            .map(|k| {
                TransactionKind::from_str(&k)
                    .ok_or_else(|| AppError::validation(format!("Invalid type '{k}'. Valid: sale, purchase")))
            })
            .transpose()?;
        let entity_type = self
            .entity
            .map(|e| {
                EntityType::from_str(&e).ok_or_else(|| {
                    AppError::validation(format!("Invalid entity '{e}'. Valid: tractor, part, service"))
                })
            })
            .transpose()?;

        Ok(TransactionFilter {
            kind,
            entity_type,
            range: self.range.into_range()?,
        })
    }
}

fn describe_range(range: &DateRange) -> String {
    match (range.start, range.end) {
        (None, None) => "(all time)".to_string(),
        (Some(start), None) => format!("from {}", format_date(start)),
        (None, Some(end)) => format!("up to {}", format_date(end)),
        (Some(start), Some(end)) => format!("{} to {}", format_date(start), format_date(end)),
    }
}

fn parse_money(input: &str) -> Result<i64> {
    parse_cents(input)
        .map_err(|e| AppError::validation(e.to_string()))
        .context("Use amounts like '50.00' or '50'")
}

fn parse_day(input: &str) -> Result<chrono::NaiveDate> {
    crate::domain::parse_date(input)
        .ok_or_else(|| AppError::validation(format!("Invalid date '{input}'. Use YYYY-MM-DD")))
        .map_err(Into::into)
}

fn parse_tractor_type(input: &str) -> Result<TractorType> {
    TractorType::from_str(input)
        .ok_or_else(|| AppError::validation(format!("Invalid tractor type '{input}'. Valid: new, used")))
        .map_err(Into::into)
}

fn parse_category(input: &str) -> Result<ExpenseCategory> {
    ExpenseCategory::from_str(input)
        .ok_or_else(|| {
            AppError::validation(format!("Invalid category '{input}'. Valid: salary, rent, bill, misc"))
        })
        .map_err(Into::into)
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_sale_with_trade_in() {
        let cli = Cli::try_parse_from([
            "dealerbook",
            "--token",
            "t",
            "tractor",
            "sell",
            "1",
            "--price",
            "15000",
            "--customer",
            "Farmer Joe",
            "--trade-in-brand",
            "Ford",
            "--trade-in-model",
            "3000",
            "--trade-in-chassis",
            "CH-9",
            "--trade-in-price",
            "4000",
        ])
        .unwrap();

        let Commands::Tractor(TractorCommands::Sell { trade_in, .. }) = cli.command else {
            panic!("expected tractor sell");
        };
        let trade_in = trade_in.into_new_tractor().unwrap().unwrap();
        assert_eq!(trade_in.purchase_price, 400_000);
        assert_eq!(trade_in.tractor_type, TractorType::Used);
    }

    #[test]
    fn test_trade_in_requires_all_fields() {
        let result = Cli::try_parse_from([
            "dealerbook",
            "tractor",
            "sell",
            "1",
            "--price",
            "15000",
            "--customer",
            "Farmer Joe",
            "--trade-in-brand",
            "Ford",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_trade_in_without_brand_is_rejected() {
        let result = Cli::try_parse_from([
            "dealerbook",
            "tractor",
            "sell",
            "1",
            "--price",
            "15000",
            "--customer",
            "Farmer Joe",
            "--trade-in-model",
            "3000",
            "--trade-in-chassis",
            "CH-9",
            "--trade-in-price",
            "4000",
        ]);
        assert!(result.is_err());

        let result = Cli::try_parse_from([
            "dealerbook",
            "tractor",
            "sell",
            "1",
            "--price",
            "15000",
            "--customer",
            "Farmer Joe",
            "--trade-in-model",
            "3000",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_partial_trade_in_never_becomes_plain_sale() {
        let partial = TradeInArgs {
            trade_in_brand: None,
            trade_in_model: Some("3000".into()),
            trade_in_chassis: Some("CH-9".into()),
            trade_in_price: Some("4000".into()),
            trade_in_year: None,
            trade_in_engine: None,
        };
        let err = partial.into_new_tractor().unwrap_err();
        assert_eq!(
            err.downcast_ref::<AppError>().map(AppError::kind),
            Some(ErrorKind::Validation)
        );

        let none = TradeInArgs {
            trade_in_brand: None,
            trade_in_model: None,
            trade_in_chassis: None,
            trade_in_price: None,
            trade_in_year: None,
            trade_in_engine: None,
        };
        assert!(none.into_new_tractor().unwrap().is_none());
    }

    #[test]
    fn test_negative_stock_adjustment_parses() {
        let cli = Cli::try_parse_from(["dealerbook", "part", "adjust", "3", "-2"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Part(PartCommands::Adjust { id: 3, delta: -2 })
        ));
    }

    #[test]
    fn test_date_range_rejects_inverted_bounds() {
        let args = DateRangeArgs {
            from: Some("2024-02-01".into()),
            to: Some("2024-01-01".into()),
        };
        assert!(args.into_range().is_err());
    }

    #[test]
    fn test_exit_codes_follow_error_kind() {
        let not_found: anyhow::Error = AppError::TractorNotFound(1).into();
        let forbidden: anyhow::Error = AppError::Forbidden { required: Role::Admin }.into();
        let other = anyhow::anyhow!("boom");
        assert_eq!(exit_code(&not_found), 3);
        assert_eq!(exit_code(&forbidden), 5);
        assert_eq!(exit_code(&other), 1);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a much longer description", 10), "a much ...");
    }
}
