use std::collections::HashSet;
use std::io::{BufRead, Write};

use anyhow::Result;
use stock::series;
use stock::validate::{Reply, validate_date, validate_tickers};
use stock::{ChartKind, ChartRenderer, DateRange, PriceSeries, PriceSource, Ticker, TradingDate};
use tracing::{debug, info, info_span, warn};
use tracing_futures::Instrument;

use crate::browser::UrlOpener;
use crate::config::Config;
use crate::terminal::Terminal;

pub const MENU_CHOICES: [&str; 6] = [
    "1. Show Line Chart",
    "2. Show Area Chart",
    "3. Analyze Moving Averages",
    "4. View Candlestick Chart",
    "5. Open List of Stock Tickers",
    "6. Exit Program",
];

const TICKER_PROMPT: &str = "Enter Stock Ticker(s), or type 'Return' to go back: ";
const START_PROMPT: &str = "Enter start date (YYYY-MM-DD), or 'Return' to go back: ";
const END_PROMPT: &str = "Enter end date (YYYY-MM-DD), or 'Return' to go back: ";
const INVALID_DATE: &str = "Invalid date format. Please enter a valid date (YYYY-MM-DD).";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Chart(ChartKind),
    TickerList,
    Exit,
}

impl MenuChoice {
    /// Reads the leading digit of a menu answer.
    pub fn parse(answer: &str) -> Option<Self> {
        match answer.trim_start().chars().next()? {
            '1' => Some(MenuChoice::Chart(ChartKind::Line)),
            '2' => Some(MenuChoice::Chart(ChartKind::Area)),
            '3' => Some(MenuChoice::Chart(ChartKind::MovingAverage)),
            '4' => Some(MenuChoice::Chart(ChartKind::Candlestick)),
            '5' => Some(MenuChoice::TickerList),
            '6' => Some(MenuChoice::Exit),
            _ => None,
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finish {
    Quit,
    Rendered(ChartKind),
    InputClosed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum State {
    Menu,
    CollectTickers {
        kind: ChartKind,
        /// Prompts so far that produced no usable ticker.
        attempts: usize,
    },
    CollectDates {
        kind: ChartKind,
        tickers: Vec<Ticker>,
    },
    Fetch {
        kind: ChartKind,
        tickers: Vec<Ticker>,
        range: DateRange,
    },
    Render {
        kind: ChartKind,
        series: PriceSeries,
    },
    Exit(Finish),
}

/// Drives one session from the main menu to an exit.
pub struct MenuLoop<S, C, B, R, W> {
    source: S,
    renderer: C,
    browser: B,
    terminal: Terminal<R, W>,
    config: Config,
}

impl<S, C, B, R, W> MenuLoop<S, C, B, R, W>
where
    S: PriceSource,
    C: ChartRenderer,
    B: UrlOpener,
    R: BufRead,
    W: Write,
{
    pub fn new(
        source: S,
        renderer: C,
        browser: B,
        terminal: Terminal<R, W>,
        config: Config,
    ) -> Self {
        Self {
            source,
            renderer,
            browser,
            terminal,
            config,
        }
    }

    pub fn terminal(&self) -> &Terminal<R, W> {
        &self.terminal
    }

    pub async fn run(&mut self) -> Result<Finish> {
        let mut state = State::Menu;

        loop {
            if let State::Exit(finish) = state {
                info!(?finish, "session finished");
                return Ok(finish);
            }
            state = self.step(state).await?;
        }
    }

    /// Performs the work of `state` and returns the state that follows.
    pub async fn step(&mut self, state: State) -> Result<State> {
        debug!(?state, "entering state");

        match state {
            State::Menu => self.menu(),
            State::CollectTickers { kind, attempts } => self.collect_tickers(kind, attempts),
            State::CollectDates { kind, tickers } => self.collect_dates(kind, tickers),
            State::Fetch {
                kind,
                tickers,
                range,
            } => self.fetch(kind, tickers, range).await,
            State::Render { kind, series } => self.render(kind, &series),
            State::Exit(finish) => Ok(State::Exit(finish)),
        }
    }

    fn menu(&mut self) -> Result<State> {
        self.terminal.say("What do you want to do?")?;
        for choice in MENU_CHOICES {
            self.terminal.say(format_args!("  {choice}"))?;
        }

        let Some(answer) = self.terminal.prompt("Select an option (1-6): ")? else {
            return Ok(State::Exit(Finish::InputClosed));
        };

        let next = match MenuChoice::parse(&answer) {
            Some(MenuChoice::Chart(kind)) => State::CollectTickers { kind, attempts: 0 },
            Some(MenuChoice::TickerList) => {
                self.open_ticker_list()?;
                State::Menu
            }
            Some(MenuChoice::Exit) => State::Exit(Finish::Quit),
            None => {
                self.terminal.say(format_args!("Unknown option: {:?}", answer.trim()))?;
                State::Menu
            }
        };

        Ok(next)
    }

    fn open_ticker_list(&mut self) -> Result<()> {
        let url = self.config.ticker_list_url.as_str();
        match self.browser.open(url) {
            Ok(()) => info!(url, "opened ticker list"),
            Err(e) => {
                warn!(error = ?e, url, "failed to open ticker list");
                self.terminal.say(format_args!("Could not open a browser. Visit {url}"))?;
            }
        }
        Ok(())
    }

    fn collect_tickers(&mut self, kind: ChartKind, attempts: usize) -> Result<State> {
        let Some(answer) = self.terminal.prompt(TICKER_PROMPT)? else {
            return Ok(State::Exit(Finish::InputClosed));
        };

        let batch = match validate_tickers(&answer) {
            Reply::Return => return Ok(State::Menu),
            Reply::Value(batch) => batch,
        };

        for token in &batch.rejected {
            self.terminal.say(format_args!("Invalid stock ticker: {token}"))?;
        }

        if batch.tickers.is_empty() {
            self.terminal.say("Please enter at least one valid ticker.")?;

            let attempts = attempts + 1;
            if let Some(max) = self.config.ticker_attempts
                && attempts >= max
            {
                warn!(attempts, "no valid ticker entered, giving up");
                self.terminal.say("Returning to the menu.")?;
                return Ok(State::Menu);
            }
            return Ok(State::CollectTickers { kind, attempts });
        }

        let symbols: Vec<&str> = batch.tickers.iter().map(Ticker::as_str).collect();
        info!(kind = %kind, tickers = ?symbols, "tickers accepted");
        Ok(State::CollectDates {
            kind,
            tickers: batch.tickers,
        })
    }

    fn collect_dates(&mut self, kind: ChartKind, tickers: Vec<Ticker>) -> Result<State> {
        let start = match self.ask_date(START_PROMPT)? {
            Some(Reply::Value(date)) => date,
            Some(Reply::Return) => return Ok(State::Menu),
            None => return Ok(State::Exit(Finish::InputClosed)),
        };

        let end = match self.ask_date(END_PROMPT)? {
            Some(Reply::Value(date)) => date,
            Some(Reply::Return) => return Ok(State::Menu),
            None => return Ok(State::Exit(Finish::InputClosed)),
        };

        Ok(State::Fetch {
            kind,
            tickers,
            range: DateRange { start, end },
        })
    }

    /// Re-asks until the answer is a date or `Return`. `None` on end of input.
    fn ask_date(&mut self, question: &str) -> Result<Option<Reply<TradingDate>>> {
        loop {
            let Some(answer) = self.terminal.prompt(question)? else {
                return Ok(None);
            };

            match validate_date(&answer) {
                Ok(reply) => return Ok(Some(reply)),
                Err(e) => {
                    debug!(error = %e, "date rejected");
                    self.terminal.say(INVALID_DATE)?;
                }
            }
        }
    }

    async fn fetch(
        &mut self,
        kind: ChartKind,
        tickers: Vec<Ticker>,
        range: DateRange,
    ) -> Result<State> {
        let mut series = PriceSeries::new();
        let mut seen = HashSet::new();
        let mut skipped: usize = 0;

        for ticker in tickers {
            if !seen.insert(ticker.clone()) {
                debug!(%ticker, "duplicate ticker skipped");
                continue;
            }

            let span = info_span!(
                "fetch",
                ticker = %ticker,
                start = %range.start,
                end = %range.end
            );
            let result = self.source.fetch(&ticker, &range).instrument(span).await;

            match result {
                Ok(rows) if rows.is_empty() => {
                    skipped += 1;
                    warn!(%ticker, "no rows returned");
                    self.terminal.say(format_args!("No data found for {ticker}."))?;
                }
                Ok(rows) => {
                    info!(%ticker, rows = rows.len(), "fetched price rows");
                    series.insert(ticker, rows);
                }
                Err(e) => {
                    skipped += 1;
                    warn!(%ticker, error = ?e, "fetch failed");
                    self.terminal.say(format_args!("Error downloading {ticker}: {e:#}"))?;
                }
            }
        }

        info!(fetched = series.len(), skipped, "completed fetch pass");

        if series.is_empty() {
            self.terminal.say("No data retrieved for the selected tickers.")?;
            return Ok(State::Menu);
        }

        Ok(State::Render { kind, series })
    }

    fn render(&mut self, kind: ChartKind, prices: &PriceSeries) -> Result<State> {
        let payload = series::build(kind, prices)?;
        let tickers: Vec<&str> = payload.tickers().into_iter().map(Ticker::as_str).collect();

        self.renderer.render(&payload)?;
        self.terminal.say(format_args!(
            "Showing {kind} chart for {}.",
            tickers.join(", ")
        ))?;

        Ok(State::Exit(Finish::Rendered(kind)))
    }
}
