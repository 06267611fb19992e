// backend/src/report/export.rs
//
// Downloadable renderings of an executive report: plain text, xlsx workbook
// and a printable HTML page.

use std::fmt::Write as _;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use thiserror::Error;

use super::{Report, ReportBody};
use crate::kpi::format::{format_fixed, format_thousands, round_to};

const TITLE: &str = "RELATÓRIO EXECUTIVO - LAVANDERIA";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unknown export format '{0}': expected txt, xlsx or html")]
    UnknownFormat(String),
    #[error("spreadsheet rendering failed: {0}")]
    Xlsx(#[from] XlsxError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Txt,
    Xlsx,
    Html,
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(ExportFormat::Txt),
            "xlsx" | "excel" => Ok(ExportFormat::Xlsx),
            // The printable page stands in for the old PDF option.
            "html" | "pdf" => Ok(ExportFormat::Html),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Txt => "txt",
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Html => "html",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Txt => "text/plain; charset=utf-8",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ExportFormat::Html => "text/html; charset=utf-8",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportedReport {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

pub fn export_filename(generated_at: NaiveDateTime, format: ExportFormat) -> String {
    format!(
        "relatorio_executivo_{}.{}",
        generated_at.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

pub fn export(report: &Report, format: ExportFormat) -> Result<ExportedReport, ExportError> {
    let bytes = match format {
        ExportFormat::Txt => render_text(report).into_bytes(),
        ExportFormat::Html => render_html(report).into_bytes(),
        ExportFormat::Xlsx => render_xlsx(report)?,
    };
    Ok(ExportedReport {
        filename: export_filename(report.generated_at, format),
        content_type: format.content_type(),
        bytes,
    })
}

struct Metric {
    label: &'static str,
    value: f64,
    display: String,
}

fn metric(label: &'static str, value: f64, display: String) -> Metric {
    Metric {
        label,
        value,
        display,
    }
}

fn production_metrics(body: &ReportBody) -> Vec<Metric> {
    let p = &body.production;
    vec![
        metric(
            "Produção no Período (kg)",
            p.period_weight_kg,
            format!("{} kg", format_thousands(p.period_weight_kg)),
        ),
        metric(
            "Ciclos no Período",
            p.period_cycles as f64,
            format_thousands(p.period_cycles as f64),
        ),
        metric(
            "Média Diária (kg)",
            p.daily_avg_kg,
            format!("{} kg", format_thousands(p.daily_avg_kg)),
        ),
        metric(
            "Eficiência Média (%)",
            p.efficiency_percent,
            format!("{}%", format_fixed(p.efficiency_percent, 1)),
        ),
    ]
}

fn consumption_metrics(body: &ReportBody) -> Vec<Metric> {
    let c = &body.consumption;
    vec![
        metric(
            "Água no Período (L)",
            c.water_liters,
            format!("{} L", format_thousands(c.water_liters)),
        ),
        metric(
            "Água por kg (L/kg)",
            c.water_per_kg,
            format!("{} L/kg", format_fixed(c.water_per_kg, 2)),
        ),
        metric(
            "Químicos no Período (kg)",
            c.chemical_kg,
            format!("{} kg", format_fixed(c.chemical_kg, 1)),
        ),
        metric(
            "Químicos por kg",
            c.chemical_per_kg,
            format!("{} kg/kg", format_fixed(c.chemical_per_kg, 3)),
        ),
    ]
}

fn alarm_metrics(body: &ReportBody) -> Vec<Metric> {
    let a = &body.alarms;
    vec![
        metric(
            "Alarmes Ativos",
            a.active_alarms as f64,
            format_thousands(a.active_alarms as f64),
        ),
        metric(
            "Alarmes no Período",
            a.period_alarms as f64,
            format_thousands(a.period_alarms as f64),
        ),
        metric(
            "Críticos/Altos",
            a.critical_high as f64,
            format_thousands(a.critical_high as f64),
        ),
        metric(
            "Tempo Médio de Resolução (min)",
            a.avg_resolution_minutes,
            format!("{} min", format_fixed(a.avg_resolution_minutes, 1)),
        ),
    ]
}

fn period_line(report: &Report) -> String {
    format!(
        "{} a {} ({} dias)",
        report.period_start.format("%d/%m/%Y"),
        report.period_end.format("%d/%m/%Y"),
        report.period_days
    )
}

// ───────────────────────────────────────
// Plain text
// ───────────────────────────────────────
pub fn render_text(report: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {TITLE}");
    let _ = writeln!(out, "Gerado em: {}", report.generated_at.format("%d/%m/%Y %H:%M"));
    let _ = writeln!(out, "Período: {}", period_line(report));

    let body = match (&report.body, &report.error) {
        (Some(body), None) => body,
        (_, error) => {
            let reason = error.as_deref().unwrap_or("sem dados");
            let _ = writeln!(out, "\nRelatório indisponível: {reason}");
            return out;
        }
    };

    let sections = [
        ("RESUMO DE PRODUÇÃO", production_metrics(body)),
        ("RESUMO DE CONSUMOS", consumption_metrics(body)),
    ];
    for (title, metrics) in &sections {
        let _ = writeln!(out, "\n## {title}");
        for m in metrics {
            let _ = writeln!(out, "- {}: {}", m.label, m.display);
        }
    }

    let _ = writeln!(out, "\n## DETALHAMENTO DE QUÍMICOS");
    if body.chemicals.is_empty() {
        let _ = writeln!(out, "- Sem dados");
    }
    for chem in &body.chemicals {
        let _ = writeln!(
            out,
            "- {}: {:.1} kg ({} ciclos)",
            chem.label, chem.quantity_kg, chem.cycles
        );
    }

    let _ = writeln!(out, "\n## RESUMO DE ALARMES");
    for m in alarm_metrics(body) {
        let _ = writeln!(out, "- {}: {}", m.label, m.display);
    }

    let _ = writeln!(out, "\n## RECOMENDAÇÕES");
    for (i, rec) in body.recommendations.iter().enumerate() {
        let _ = writeln!(out, "{}. {rec}", i + 1);
    }
    out
}

// ───────────────────────────────────────
// Printable HTML
// ───────────────────────────────────────
const HTML_STYLE: &str = "body{font-family:Arial,sans-serif;margin:40px;color:#2c3e50}\
h1{border-bottom:3px solid #3498db;padding-bottom:8px}\
h2{color:#2c3e50;border-bottom:2px solid #3498db;margin-top:32px}\
table{width:100%;border-collapse:collapse;margin:16px 0}\
th{background:#3498db;color:#fff}\
th,td{padding:8px;border:1px solid #ddd;text-align:left}\
.error{color:#c0392b;font-weight:bold}\
@media print{body{margin:0}}";

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn html_metric_table(out: &mut String, title: &str, metrics: &[Metric]) {
    let _ = write!(out, "<h2>{title}</h2><table><tr><th>Métrica</th><th>Valor</th></tr>");
    for m in metrics {
        let _ = write!(
            out,
            "<tr><td>{}</td><td>{}</td></tr>",
            escape_html(m.label),
            escape_html(&m.display)
        );
    }
    out.push_str("</table>");
}

pub fn render_html(report: &Report) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "<!DOCTYPE html><html lang=\"pt-BR\"><head><meta charset=\"utf-8\">\
         <title>{TITLE}</title><style>{HTML_STYLE}</style></head><body><h1>{TITLE}</h1>\
         <p><strong>Gerado em:</strong> {}</p><p><strong>Período de Análise:</strong> {}</p>",
        report.generated_at.format("%d/%m/%Y %H:%M"),
        period_line(report)
    );

    match (&report.body, &report.error) {
        (Some(body), None) => {
            html_metric_table(&mut out, "RESUMO DE PRODUÇÃO", &production_metrics(body));
            html_metric_table(&mut out, "RESUMO DE CONSUMOS", &consumption_metrics(body));

            out.push_str(
                "<h2>DETALHAMENTO DE QUÍMICOS</h2><table><tr><th>Tipo</th>\
                 <th>Quantidade (kg)</th><th>Ciclos</th><th>Média/Ciclo (kg)</th></tr>",
            );
            if body.chemicals.is_empty() {
                out.push_str("<tr><td colspan=\"4\">Sem dados</td></tr>");
            }
            for chem in &body.chemicals {
                let _ = write!(
                    out,
                    "<tr><td>{}</td><td>{:.2}</td><td>{}</td><td>{:.3}</td></tr>",
                    escape_html(&chem.label),
                    chem.quantity_kg,
                    chem.cycles,
                    chem.avg_per_cycle_kg
                );
            }
            out.push_str("</table>");

            html_metric_table(&mut out, "RESUMO DE ALARMES", &alarm_metrics(body));

            out.push_str("<h2>RECOMENDAÇÕES</h2><ol>");
            for rec in &body.recommendations {
                let _ = write!(out, "<li>{}</li>", escape_html(rec));
            }
            out.push_str("</ol>");
        }
        (_, error) => {
            let _ = write!(
                out,
                "<p class=\"error\">Relatório indisponível: {}</p>",
                escape_html(error.as_deref().unwrap_or("sem dados"))
            );
        }
    }

    out.push_str("</body></html>");
    out
}

// ───────────────────────────────────────
// Spreadsheet
// ───────────────────────────────────────
fn metric_sheet(
    workbook: &mut Workbook,
    name: &str,
    metrics: &[Metric],
    header: &Format,
) -> Result<(), XlsxError> {
    let sheet = workbook.add_worksheet();
    sheet.set_name(name)?;
    sheet.set_column_width(0, 34)?;
    sheet.set_column_width(1, 16)?;
    sheet.write_string_with_format(0, 0, "Métrica", header)?;
    sheet.write_string_with_format(0, 1, "Valor", header)?;
    for (row, m) in (1u32..).zip(metrics) {
        sheet.write_string(row, 0, m.label)?;
        sheet.write_number(row, 1, m.value)?;
    }
    Ok(())
}

pub fn render_xlsx(report: &Report) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let body = match (&report.body, &report.error) {
        (Some(body), None) => body,
        (_, error) => {
            let sheet = workbook.add_worksheet();
            sheet.set_name("Relatório")?;
            sheet.write_string_with_format(0, 0, "Erro", &header)?;
            sheet.write_string(0, 1, error.as_deref().unwrap_or("sem dados"))?;
            sheet.write_string(1, 0, "Período")?;
            sheet.write_string(1, 1, period_line(report))?;
            return Ok(workbook.save_to_buffer()?);
        }
    };

    metric_sheet(&mut workbook, "Produção", &production_metrics(body), &header)?;
    metric_sheet(&mut workbook, "Consumos", &consumption_metrics(body), &header)?;

    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Químicos")?;
        sheet.set_column_width(0, 30)?;
        let columns = [
            "Tipo de Químico",
            "Quantidade (kg)",
            "Ciclos Utilizados",
            "Média por Ciclo (kg)",
        ];
        for (col, title) in (0u16..).zip(columns) {
            sheet.write_string_with_format(0, col, title, &header)?;
        }
        if body.chemicals.is_empty() {
            sheet.write_string(1, 0, "Sem dados")?;
            sheet.write_number(1, 1, 0)?;
            sheet.write_number(1, 2, 0)?;
            sheet.write_number(1, 3, 0)?;
        }
        for (row, chem) in (1u32..).zip(&body.chemicals) {
            sheet.write_string(row, 0, chem.label.as_str())?;
            sheet.write_number(row, 1, round_to(chem.quantity_kg, 2))?;
            sheet.write_number(row, 2, chem.cycles as f64)?;
            sheet.write_number(row, 3, round_to(chem.avg_per_cycle_kg, 3))?;
        }
    }

    metric_sheet(&mut workbook, "Alarmes", &alarm_metrics(body), &header)?;

    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Recomendações")?;
        sheet.set_column_width(0, 70)?;
        sheet.write_string_with_format(0, 0, "Recomendações", &header)?;
        for (row, rec) in (1u32..).zip(&body.recommendations) {
            sheet.write_string(row, 0, *rec)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChemicalUsage;
    use crate::report::{
        AlarmSection, ConsumptionSection, ProductionSection, RECOMMENDATIONS,
    };
    use chrono::NaiveDate;

    fn generated_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 7)
            .unwrap()
            .and_hms_opt(18, 5, 9)
            .unwrap()
    }

    fn sample(chemicals: Vec<ChemicalUsage>) -> Report {
        Report {
            generated_at: generated_at(),
            period_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2024, 1, 7).unwrap(),
            period_days: 7,
            body: Some(ReportBody {
                production: ProductionSection {
                    period_weight_kg: 8_750.0,
                    period_cycles: 315,
                    daily_avg_kg: 1_250.0,
                    efficiency_percent: 94.2,
                },
                consumption: ConsumptionSection {
                    water_liters: 59_500.0,
                    water_per_kg: 6.8,
                    chemical_kg: 875.0,
                    chemical_per_kg: 0.1,
                },
                chemicals,
                alarms: AlarmSection {
                    active_alarms: 2,
                    period_alarms: 5,
                    critical_high: 1,
                    avg_resolution_minutes: 12.0,
                },
                recommendations: RECOMMENDATIONS.to_vec(),
            }),
            error: None,
        }
    }

    fn failed() -> Report {
        Report {
            body: None,
            error: Some("production data unavailable".into()),
            ..sample(Vec::new())
        }
    }

    fn detergent() -> ChemicalUsage {
        ChemicalUsage {
            code: "Q1".into(),
            label: "Detergente Principal (Q1)".into(),
            quantity_kg: 28.0,
            cycles: 7,
            avg_per_cycle_kg: 4.0,
        }
    }

    #[test]
    fn format_names_are_parsed_leniently() {
        assert_eq!("txt".parse::<ExportFormat>().unwrap(), ExportFormat::Txt);
        assert_eq!("Excel".parse::<ExportFormat>().unwrap(), ExportFormat::Xlsx);
        assert_eq!("pdf".parse::<ExportFormat>().unwrap(), ExportFormat::Html);
        assert!(matches!(
            "docx".parse::<ExportFormat>(),
            Err(ExportError::UnknownFormat(f)) if f == "docx"
        ));
    }

    #[test]
    fn filename_carries_generation_time() {
        assert_eq!(
            export_filename(generated_at(), ExportFormat::Xlsx),
            "relatorio_executivo_20240107_180509.xlsx"
        );
    }

    #[test]
    fn text_export_has_every_section_in_order() {
        let text = render_text(&sample(vec![detergent()]));

        let headers = [
            "## RESUMO DE PRODUÇÃO",
            "## RESUMO DE CONSUMOS",
            "## DETALHAMENTO DE QUÍMICOS",
            "## RESUMO DE ALARMES",
            "## RECOMENDAÇÕES",
        ];
        let positions: Vec<usize> = headers
            .iter()
            .map(|h| text.find(h).unwrap_or_else(|| panic!("missing {h}")))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        assert!(text.contains("- Produção no Período (kg): 8,750 kg"));
        assert!(text.contains("- Água por kg (L/kg): 6.80 L/kg"));
        assert!(text.contains("- Detergente Principal (Q1): 28.0 kg (7 ciclos)"));
        assert!(text.contains("1. Manter consumo de água"));
        assert!(text.contains("4. Revisar consumo de químicos"));
    }

    #[test]
    fn text_export_marks_missing_chemicals() {
        let text = render_text(&sample(Vec::new()));
        assert!(text.contains("## DETALHAMENTO DE QUÍMICOS\n- Sem dados"));
    }

    #[test]
    fn error_report_exports_short_notice() {
        let text = render_text(&failed());
        assert!(text.contains("Relatório indisponível: production data unavailable"));
        assert!(!text.contains("RESUMO DE PRODUÇÃO"));

        let html = render_html(&failed());
        assert!(html.contains("class=\"error\""));
        assert!(!html.contains("RECOMENDAÇÕES"));
    }

    #[test]
    fn html_export_escapes_labels() {
        let mut chem = detergent();
        chem.label = "<Ácido & Cia>".into();
        let html = render_html(&sample(vec![chem]));

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("&lt;Ácido &amp; Cia&gt;"));
        assert_eq!(html.matches("<li>").count(), 4);
    }

    #[test]
    fn xlsx_export_is_a_zip_container() {
        let exported = export(&sample(vec![detergent()]), ExportFormat::Xlsx).unwrap();
        assert!(exported.bytes.starts_with(b"PK"));
        assert_eq!(exported.filename, "relatorio_executivo_20240107_180509.xlsx");

        let empty = render_xlsx(&sample(Vec::new())).unwrap();
        assert!(empty.starts_with(b"PK"));
        assert!(render_xlsx(&failed()).unwrap().starts_with(b"PK"));
    }
}
