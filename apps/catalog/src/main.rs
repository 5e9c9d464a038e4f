use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    auth::format_phone,
    config::normalize_database_url,
    import::import_books,
    load_settings,
    view::{ErrorBanner, ErrorContext},
    AuthService, BookDetailController, BookListController, CatalogApi, ClientError,
    ClientSettings, DurableSessionStore, ImportError, LibraryDetailController,
    LibraryListController, MapView, SignupForm, SortCriterion, YandexGeocoder,
};
use shared::{
    domain::{BookDraft, BookId, Coordinates, LibraryId},
    error::ApiError,
};
use tracing_subscriber::EnvFilter;

mod render;

#[derive(Parser, Debug)]
#[command(name = "kutubxona", about = "Library network catalog client")]
struct Cli {
    /// Catalog API base url, including the `/api/v1` prefix.
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Session database (sqlite url or file path).
    #[arg(long, global = true)]
    database_url: Option<String>,
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search the book catalog.
    Home {
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    Libraries {
        #[arg(long)]
        search: Option<String>,
        /// name-asc, books-asc or books-desc
        #[arg(long)]
        sort: Option<SortCriterion>,
        #[arg(long)]
        with_books: bool,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    Library {
        id: i64,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    Books {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        sort: Option<SortCriterion>,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    Book {
        id: i64,
    },
    Login {
        #[arg(long)]
        phone: String,
        #[arg(long)]
        password: String,
    },
    /// Register a library and its librarian account.
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "")]
        instagram: String,
        #[arg(long, default_value = "")]
        facebook: String,
        #[arg(long, default_value = "")]
        telegram: String,
    },
    Profile,
    Logout,
    AddBook {
        #[arg(long)]
        name: String,
        #[arg(long)]
        author: String,
        #[arg(long)]
        publisher: Option<String>,
        #[arg(long)]
        quantity: Option<u32>,
    },
    /// Change a book; omitted fields keep their current values.
    EditBook {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        publisher: Option<String>,
        #[arg(long)]
        quantity: Option<u32>,
    },
    DeleteBook {
        id: i64,
    },
    /// Bulk-create books from a csv, xlsx, xls or ods file.
    Import {
        file: PathBuf,
    },
    /// Locate an address on the map.
    Map {
        address: String,
        #[arg(long, default_value = "")]
        name: String,
    },
    /// Name the place at a coordinate.
    #[command(allow_negative_numbers = true)]
    Where {
        latitude: f64,
        longitude: f64,
    },
}

impl Command {
    fn context(&self) -> ErrorContext {
        match self {
            Self::AddBook { .. } => ErrorContext::Create,
            Self::EditBook { .. } => ErrorContext::Update,
            Self::DeleteBook { .. } => ErrorContext::Delete,
            Self::Import { .. } => ErrorContext::Import,
            Self::Login { .. } | Self::Logout | Self::Profile => ErrorContext::Login,
            Self::Signup { .. } => ErrorContext::Signup,
            Self::Map { .. } | Self::Where { .. } => ErrorContext::Map,
            _ => ErrorContext::Load,
        }
    }
}

struct App {
    settings: ClientSettings,
    api: Arc<CatalogApi>,
}

impl App {
    async fn connect(cli: &Cli) -> Result<Self> {
        let mut settings = load_settings(cli.config.as_deref())?;
        if let Some(api_url) = &cli.api_url {
            settings.api_base_url = api_url.clone();
        }
        if let Some(database_url) = &cli.database_url {
            settings.database_url = normalize_database_url(database_url);
        }

        let session = DurableSessionStore::initialize(&settings.database_url)
            .await
            .with_context(|| format!("failed to open session store {}", settings.database_url))?;
        let api = CatalogApi::new(settings.api_base_url.clone(), Arc::new(session))
            .with_create_path(settings.create_path.clone());
        tracing::debug!(api = api.base_url(), "catalog client ready");

        Ok(Self {
            settings,
            api: Arc::new(api),
        })
    }

    fn books(&self) -> BookListController {
        BookListController::with_page_size(self.api.clone(), self.settings.books_page_size)
    }

    fn geocoder(&self) -> Result<YandexGeocoder, ClientError> {
        YandexGeocoder::new(
            &self.settings.geocoder_url,
            self.settings.geocoder_api_key.as_deref(),
            &self.settings.lang,
        )
    }
}

async fn list_books(
    app: &App,
    search: Option<String>,
    sort: Option<SortCriterion>,
    page: usize,
) -> Result<()> {
    let mut books = app.books();
    books.load().await?;
    if let Some(query) = search {
        books.search(&query);
    }
    if let Some(sort) = sort {
        books.sort(sort);
    }
    for book in books.page(page) {
        render::book_line(book);
    }
    render::sort_note(books.sort_criterion());
    render::caption(books.page_window(), books.current_page(), books.total_pages());
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let app = App::connect(&cli).await?;
    let auth = AuthService::new(app.api.clone());

    match cli.command {
        Command::Home { search, page } => list_books(&app, search, None, page).await?,
        Command::Books { search, sort, page } => list_books(&app, search, sort, page).await?,
        Command::Libraries {
            search,
            sort,
            with_books,
            page,
        } => {
            let mut libraries =
                LibraryListController::with_page_size(app.api.clone(), app.settings.books_page_size);
            libraries.load().await?;
            libraries.only_with_books(with_books);
            if let Some(query) = search {
                libraries.search(&query);
            }
            if let Some(sort) = sort {
                libraries.sort(sort);
            }
            for library in libraries.page(page) {
                render::library_line(library);
            }
            render::sort_note(libraries.sort_criterion());
            render::caption(
                libraries.page_window(),
                libraries.current_page(),
                libraries.total_pages(),
            );
        }
        Command::Library { id, page } => {
            let mut detail = LibraryDetailController::with_page_size(
                app.api.clone(),
                app.settings.library_books_page_size,
            );
            detail.load(LibraryId(id)).await?;
            if page > 1 {
                detail.set_page(page).await?;
            }
            if let Some(library) = detail.library() {
                render::library_detail(library);
            }
            for book in detail.books() {
                render::book_line(book);
            }
            println!("-- page {}/{}", detail.current_page(), detail.total_pages().max(1));
        }
        Command::Book { id } => {
            let mut detail = BookDetailController::new(app.api.clone());
            let book = detail.load(BookId(id)).await?.clone();
            if let Some(availability) = detail.availability() {
                render::book_detail(&book, availability);
            }
        }
        Command::Login { phone, password } => {
            auth.login(&phone, &password).await?;
            println!("logged in as {}", format_phone(&phone));
        }
        Command::Signup {
            name,
            phone,
            password,
            instagram,
            facebook,
            telegram,
        } => {
            let form = SignupForm {
                name,
                phone,
                password,
                instagram,
                facebook,
                telegram,
            };
            auth.signup(&form).await?;
            println!("library registered; logged in as {}", format_phone(&form.phone));
        }
        Command::Profile => match auth.profile().await? {
            Some(user) => render::profile(&user),
            None => return Err(ClientError::Unauthorized.into()),
        },
        Command::Logout => {
            auth.logout().await?;
            println!("logged out");
        }
        Command::AddBook {
            name,
            author,
            publisher,
            quantity,
        } => {
            let draft = BookDraft {
                name,
                author,
                publisher,
                quantity_in_library: quantity,
            };
            let mut books = app.books();
            books.create(&draft).await?;
            println!("created \"{}\"; catalog now holds {} book(s)", draft.name, books.snapshot().len());
        }
        Command::EditBook {
            id,
            name,
            author,
            publisher,
            quantity,
        } => {
            let id = BookId(id);
            let mut detail = BookDetailController::new(app.api.clone());
            let mut draft = BookDraft::from(detail.load(id).await?);
            if let Some(name) = name {
                draft.name = name;
            }
            if let Some(author) = author {
                draft.author = author;
            }
            if publisher.is_some() {
                draft.publisher = publisher;
            }
            if quantity.is_some() {
                draft.quantity_in_library = quantity;
            }
            app.books().update(id, &draft).await?;
            println!("updated book #{id}");
        }
        Command::DeleteBook { id } => {
            let id = BookId(id);
            app.books().delete(id).await?;
            println!("deleted book #{id}");
        }
        Command::Import { file } => {
            let mut books = app.books();
            let report = import_books(&mut books, &file).await?;
            render::import_report(&report);
        }
        Command::Map { address, name } => {
            let mut map = MapView::new(Arc::new(app.geocoder()?));
            let name = if name.is_empty() { address.clone() } else { name };
            let label = map.show_address(&address, &name).await.clone();
            render::map(map.center(), map.marker(), &label);
        }
        Command::Where {
            latitude,
            longitude,
        } => {
            let mut map = MapView::new(Arc::new(app.geocoder()?));
            let label = map.click(Coordinates::new(latitude, longitude)).await.clone();
            render::map(map.center(), map.marker(), &label);
        }
    }

    Ok(())
}

fn report(context: ErrorContext, err: &anyhow::Error) {
    let (client, row) = match err.downcast_ref::<ImportError>() {
        Some(ImportError::Row { row, source }) => (Some(source), Some(*row)),
        _ => (err.downcast_ref::<ClientError>(), None),
    };
    let Some(client) = client else {
        eprintln!("error: {err:#}");
        return;
    };

    let banner = ErrorBanner::from_error(context, client);
    let api_error = ApiError::from(client);
    tracing::debug!(code = ?api_error.code, message = %api_error.message, "request failed");
    match row {
        Some(row) => eprintln!("{banner} (import stopped at row {row})"),
        None => eprintln!("{banner}"),
    }
    if banner.requires_reauth() {
        eprintln!("hint: run `kutubxona login --phone <phone> --password <password>` first");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let context = cli.command.context();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(context, &err);
            ExitCode::FAILURE
        }
    }
}
